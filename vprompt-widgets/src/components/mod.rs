use makepad_widgets::*;
use vprompt_data::NoticeLevel;

live_design! {
    use link::theme::*;
    use link::shaders::*;
    use link::widgets::*;
    use crate::theme::*;

    // ========================================================================
    // SHARED TEXT STYLES
    // ========================================================================

    pub SectionTitle = <Label> {
        draw_text: {
            color: (TEXT_PRIMARY)
            text_style: <FONT_SEMIBOLD>{ font_size: 16.0 }
        }
    }

    pub FieldLabel = <Label> {
        margin: {top: 8, bottom: 2}
        draw_text: {
            color: (GRAY_700)
            text_style: <FONT_MEDIUM>{ font_size: 11.0 }
        }
    }

    // Placeholder text shown under a field
    pub HintText = <Label> {
        margin: {bottom: 4}
        draw_text: {
            color: (TEXT_MUTED)
            text_style: <FONT_REGULAR>{ font_size: 10.0 }
        }
    }

    // ========================================================================
    // PANELS AND INPUTS
    // ========================================================================

    pub PanelCard = <RoundedView> {
        width: Fill, height: Fit
        flow: Down
        padding: 20
        margin: {bottom: 16}
        draw_bg: {
            instance border_radius: 10.0
            fn pixel(self) -> vec4 {
                let sdf = Sdf2d::viewport(self.pos * self.rect_size);
                sdf.box(0.5, 0.5, self.rect_size.x - 1.0, self.rect_size.y - 1.0, self.border_radius);
                sdf.fill_keep((WHITE));
                sdf.stroke((PANEL_BORDER), 1.0);
                return sdf.result;
            }
        }
    }

    pub FormInput = <TextInput> {
        width: Fill, height: Fit
        padding: {left: 10, right: 10, top: 8, bottom: 8}
        empty_text: ""
        text: ""
        draw_text: {
            text_style: <FONT_REGULAR>{ font_size: 12.0 }
            color: (TEXT_PRIMARY)
        }
        draw_bg: {
            instance border_radius: 6.0
            fn pixel(self) -> vec4 {
                let sdf = Sdf2d::viewport(self.pos * self.rect_size);
                sdf.box(0.5, 0.5, self.rect_size.x - 1.0, self.rect_size.y - 1.0, self.border_radius);
                sdf.fill_keep((WHITE));
                sdf.stroke((PANEL_BORDER), 1.0);
                return sdf.result;
            }
        }
    }

    pub FormTextArea = <FormInput> {
        height: 96
    }

    // ========================================================================
    // BUTTONS
    // `disabled` mirrors the page model; the shell ignores clicks while set
    // ========================================================================

    pub PrimaryButton = <Button> {
        width: Fit, height: Fit
        padding: {top: 10, bottom: 10, left: 18, right: 18}
        draw_text: {
            text_style: <FONT_SEMIBOLD>{ font_size: 12.0 }
            color: (WHITE)
        }
        draw_bg: {
            instance hover: 0.0
            instance pressed: 0.0
            instance disabled: 0.0
            fn pixel(self) -> vec4 {
                let sdf = Sdf2d::viewport(self.pos * self.rect_size);
                sdf.box(1.0, 1.0, self.rect_size.x - 2.0, self.rect_size.y - 2.0, 6.0);
                let base = mix((PRIMARY_500), (PRIMARY_600), max(self.hover, self.pressed));
                sdf.fill(mix(base, (DISABLED_BG), self.disabled));
                return sdf.result;
            }
        }
    }

    pub SecondaryButton = <Button> {
        width: Fit, height: Fit
        padding: {top: 8, bottom: 8, left: 14, right: 14}
        draw_text: {
            text_style: <FONT_MEDIUM>{ font_size: 11.0 }
            color: (GRAY_700)
        }
        draw_bg: {
            instance hover: 0.0
            instance pressed: 0.0
            instance disabled: 0.0
            fn pixel(self) -> vec4 {
                let sdf = Sdf2d::viewport(self.pos * self.rect_size);
                sdf.box(1.0, 1.0, self.rect_size.x - 2.0, self.rect_size.y - 2.0, 6.0);
                let base = mix((WHITE), (HOVER_BG), max(self.hover, self.pressed));
                sdf.fill_keep(mix(base, (GRAY_200), self.disabled));
                sdf.stroke((PANEL_BORDER), 1.0);
                return sdf.result;
            }
        }
    }

    pub LangToggleButton = <SecondaryButton> {
        padding: {top: 6, bottom: 6, left: 12, right: 12}
        text: "🇹🇼 中文"
    }

    // ========================================================================
    // PROGRESS BAR
    // ========================================================================

    pub ProgressBar = <View> {
        width: Fill, height: 6
        margin: {top: 8}
        visible: false
        show_bg: true
        draw_bg: {
            instance progress: 0.0
            fn pixel(self) -> vec4 {
                let sdf = Sdf2d::viewport(self.pos * self.rect_size);
                sdf.box(0.0, 0.0, self.rect_size.x, self.rect_size.y, 3.0);
                sdf.fill((GRAY_200));
                sdf.box(0.0, 0.0, self.rect_size.x * self.progress, self.rect_size.y, 3.0);
                sdf.fill((PRIMARY_500));
                return sdf.result;
            }
        }
    }

    // ========================================================================
    // RESULT THUMBNAIL
    // ========================================================================

    pub ResultThumb = <View> {
        width: 160, height: 160
        margin: {right: 8, top: 8}
        cursor: Hand
        visible: false
        thumb_image = <Image> {
            width: Fill, height: Fill
            fit: Smallest
        }
    }

    // ========================================================================
    // TOAST
    // level: 0 info, 1 success, 2 warning, 3 error
    // ========================================================================

    pub Toast = <RoundedView> {
        width: Fit, height: Fit
        padding: {left: 16, right: 16, top: 10, bottom: 10}
        cursor: Hand
        visible: false

        draw_bg: {
            instance level: 0.0
            instance border_radius: 8.0
            fn pixel(self) -> vec4 {
                let sdf = Sdf2d::viewport(self.pos * self.rect_size);
                sdf.box(0., 0., self.rect_size.x, self.rect_size.y, self.border_radius);
                let color = mix(
                    mix((INFO), (SUCCESS), step(0.5, self.level)),
                    mix((WARNING), (ERROR), step(2.5, self.level)),
                    step(1.5, self.level)
                );
                sdf.fill(vec4(color.xyz, 0.95));
                return sdf.result;
            }
        }

        toast_label = <Label> {
            width: Fit, height: Fit
            draw_text: {
                text_style: <FONT_SEMIBOLD>{ font_size: 12.0 }
                color: (WHITE)
            }
            text: ""
        }
    }

    // ========================================================================
    // IMAGE VIEWER MODAL
    // The frame is positioned from ImageViewer::layout through its margins
    // ========================================================================

    pub ImageViewerModal = <View> {
        width: Fill, height: Fill
        flow: Overlay
        visible: false

        backdrop = <View> {
            width: Fill, height: Fill
            show_bg: true
            draw_bg: {
                fn pixel(self) -> vec4 {
                    return vec4(0.0, 0.0, 0.0, 0.8);
                }
            }
        }

        stage = <View> {
            width: Fill, height: Fill
            flow: Down

            viewer_frame = <View> {
                width: 0, height: 0
                viewer_image = <Image> {
                    width: Fill, height: Fill
                    fit: Stretch
                }
            }
        }

        toolbar = <View> {
            width: Fill, height: Fit
            flow: Right
            align: {y: 0.5}
            padding: {left: 20, right: 20, top: 16}
            spacing: 8

            caption = <Label> {
                width: Fill
                draw_text: {
                    color: (WHITE)
                    text_style: <FONT_MEDIUM>{ font_size: 12.0 }
                }
                text: ""
            }
            download_btn = <SecondaryButton> { text: "Download" }
            close_btn = <SecondaryButton> { text: "✕" }
        }
    }
}

/// `level` instance value of the toast shader
pub fn toast_level(level: NoticeLevel) -> f64 {
    match level {
        NoticeLevel::Info => 0.0,
        NoticeLevel::Success => 1.0,
        NoticeLevel::Warning => 2.0,
        NoticeLevel::Error => 3.0,
    }
}
