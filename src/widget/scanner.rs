//! Capture screen: photo preview, Snap/Detect actions, recognized text and notices

use cosmic::Element;
use cosmic::iced::{Alignment, ContentFit, Length};
use cosmic::iced_core::Border;
use cosmic::iced_widget::{column, row, toggler};
use cosmic::widget::{button, container, scrollable, text};

use crate::config::TextOutput;
use crate::fl;
use crate::session::messages;
use crate::session::state::{ImageSlot, NoticeKind, Phase, ScannerState};

/// Localized text for a notice
pub fn notice_text(kind: NoticeKind) -> String {
    match kind {
        NoticeKind::PermissionGranted => fl!("notice-permission-granted"),
        NoticeKind::PermissionDenied => fl!("notice-permission-denied"),
        NoticeKind::RecognitionFailed => fl!("notice-recognition-failed"),
        NoticeKind::NoImage => fl!("notice-no-image"),
        NoticeKind::NoTextFound => fl!("notice-no-text"),
        NoticeKind::CameraUnavailable => fl!("notice-camera-unavailable"),
        NoticeKind::TextCopied => fl!("notice-text-copied"),
    }
}

/// Build the capture screen
pub fn view<'a, Msg: Clone + 'static>(
    state: &'a ScannerState,
    on_back: Msg,
    on_toggle_output: Msg,
    on_scanner: impl Fn(messages::Msg) -> Msg,
) -> Element<'a, Msg> {
    let spacing = cosmic::theme::active().cosmic().spacing;
    let space_s = spacing.space_s;

    let header = row![
        button::standard(fl!("scanner-back")).on_press(on_back),
        cosmic::widget::horizontal_space(),
        text::body(fl!("scanner-full-text")),
        toggler(state.text_output == TextOutput::FullText)
            .on_toggle(move |_| on_toggle_output.clone())
            .size(24.0),
    ]
    .spacing(space_s)
    .align_y(Alignment::Center)
    .width(Length::Fill);

    let preview: Element<'a, Msg> = match &state.image {
        ImageSlot::Captured(image) => {
            cosmic::iced_widget::Image::<cosmic::widget::image::Handle>::new(image.handle.clone())
                .content_fit(ContentFit::Contain)
                .width(Length::Fill)
                .height(Length::Fixed(320.0))
                .into()
        }
        ImageSlot::Empty => container(text::body(fl!("scanner-no-image")))
            .center_x(Length::Fill)
            .center_y(Length::Fixed(320.0))
            .into(),
    };

    let actions = row![
        button::suggested(fl!("scanner-snap")).on_press(on_scanner(messages::Msg::CaptureRequested)),
        button::standard(fl!("scanner-detect")).on_press(on_scanner(messages::Msg::DetectRequested)),
        button::standard(fl!("scanner-copy")).on_press_maybe(
            state
                .result_text
                .as_ref()
                .map(|_| on_scanner(messages::Msg::CopyText))
        ),
    ]
    .spacing(space_s)
    .align_y(Alignment::Center);

    let status: Element<'a, Msg> = match state.phase() {
        Phase::Capturing => text::caption(fl!("scanner-capturing")).into(),
        Phase::Recognizing => text::caption(fl!("scanner-recognizing")).into(),
        Phase::Idle | Phase::AwaitingPermission => cosmic::widget::vertical_space()
            .height(Length::Fixed(0.0))
            .into(),
    };

    let result: Element<'a, Msg> = match state.result_text.as_deref() {
        Some(result) => scrollable(text::body(result).width(Length::Fill))
            .height(Length::Fill)
            .into(),
        None => text::body(fl!("scanner-no-result")).into(),
    };

    let mut content = column![header, preview, actions, status, result]
        .spacing(space_s)
        .padding(spacing.space_m)
        .align_x(Alignment::Center);

    if let Some(notice) = state.notice {
        content = content.push(notice_banner(notice.kind, space_s));
    }

    content.into()
}

fn notice_banner<'a, Msg: Clone + 'static>(kind: NoticeKind, padding: u16) -> Element<'a, Msg> {
    let is_error = kind.is_error();
    container(text::body(notice_text(kind)))
        .padding(padding)
        .class(cosmic::theme::Container::Custom(Box::new(move |theme| {
            let cosmic_theme = theme.cosmic();
            let background = if is_error {
                cosmic_theme.destructive_color()
            } else {
                cosmic_theme.accent_color()
            };
            cosmic::iced::widget::container::Style {
                background: Some(cosmic::iced::Background::Color(background.into())),
                text_color: Some(cosmic_theme.on_accent_color().into()),
                border: Border {
                    radius: cosmic_theme.corner_radii.radius_s.into(),
                    ..Default::default()
                },
                ..Default::default()
            }
        })))
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_notice_has_text() {
        for kind in [
            NoticeKind::PermissionGranted,
            NoticeKind::PermissionDenied,
            NoticeKind::RecognitionFailed,
            NoticeKind::NoImage,
            NoticeKind::NoTextFound,
            NoticeKind::CameraUnavailable,
            NoticeKind::TextCopied,
        ] {
            assert!(!notice_text(kind).is_empty(), "{:?}", kind);
        }
        assert_eq!(
            notice_text(NoticeKind::RecognitionFailed),
            "Fail to detect text from image"
        );
    }

    #[test]
    fn test_error_notices() {
        assert!(NoticeKind::PermissionDenied.is_error());
        assert!(NoticeKind::NoImage.is_error());
        assert!(!NoticeKind::PermissionGranted.is_error());
        assert!(!NoticeKind::TextCopied.is_error());
    }
}
