//! # Theme - Fonts and colors shared by every VPrompt widget

use makepad_widgets::*;

live_design! {
    use link::theme::*;

    // Fonts
    pub FONT_REGULAR = <THEME_FONT_REGULAR> {}
    pub FONT_MEDIUM = <THEME_FONT_REGULAR> {}
    pub FONT_SEMIBOLD = <THEME_FONT_BOLD> {}
    pub FONT_BOLD = <THEME_FONT_BOLD> {}

    // Surfaces
    pub WHITE = #ffffff
    pub PAGE_BG = #f5f7fa
    pub PANEL_BORDER = #e5e7eb
    pub HOVER_BG = #f1f5f9
    pub BLUE_100 = #dbeafe

    // Text
    pub TEXT_PRIMARY = #1f2937
    pub GRAY_700 = #374151
    pub TEXT_MUTED = #6b7280
    pub GRAY_200 = #e5e7eb

    // Accents
    pub PRIMARY_500 = #3b82f6
    pub PRIMARY_600 = #2563eb
    pub DISABLED_BG = #cbd5e1

    // Notification levels
    pub SUCCESS = #16a34a
    pub INFO = #2563eb
    pub WARNING = #d97706
    pub ERROR = #dc2626
}
