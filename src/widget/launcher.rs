//! Launcher page with the single action that opens the capture screen

use cosmic::Element;
use cosmic::iced::{Alignment, Length};
use cosmic::iced_widget::column;
use cosmic::widget::{button, container, text};

use crate::fl;

/// Build the launcher page
pub fn view<'a, Msg: Clone + 'static>(on_capture: Msg) -> Element<'a, Msg> {
    let spacing = cosmic::theme::active().cosmic().spacing;

    let content = column![
        text::title3(fl!("launcher-heading")),
        button::suggested(fl!("launcher-capture")).on_press(on_capture),
    ]
    .spacing(spacing.space_m)
    .align_x(Alignment::Center);

    container(content).center(Length::Fill).into()
}
