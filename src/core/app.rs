use std::collections::HashMap;
use std::sync::Arc;

use cosmic::Task;
use cosmic::app;
use cosmic::iced::task::Handle;
use cosmic::iced_runtime::clipboard;

use crate::capture::camera;
use crate::capture::ocr::TextRecognizer;
use crate::config::{SnapTextConfig, TextOutput};
use crate::session::messages::{self, RecognitionOutcome};
use crate::session::requests::RequestId;
use crate::session::state::ScannerState;
use crate::session::update::{self, Effect};

pub const APP_ID: &str = "io.github.hojjatabdollahi.snaptext";

pub(crate) fn run() -> cosmic::iced::Result {
    let settings = cosmic::app::Settings::default().size(cosmic::iced::Size::new(480.0, 760.0));
    cosmic::app::run::<App>(settings, ())
}

/// A live capture screen and the tasks it is waiting on
pub struct ScannerScreen {
    pub state: ScannerState,
    /// Abort handles for in-flight requests. Each aborts its task when dropped,
    /// so tearing the screen down cancels everything it started.
    tasks: HashMap<RequestId, Handle>,
    /// Expiry timer of the notice on screen, replaced with the notice
    notice_timer: Option<Handle>,
}

impl ScannerScreen {
    pub fn new(text_output: TextOutput) -> Self {
        Self {
            state: ScannerState::new(text_output),
            tasks: HashMap::new(),
            notice_timer: None,
        }
    }

    /// Apply a message, releasing the task handle of the request it answers
    fn receive(&mut self, msg: messages::Msg) -> Vec<Effect> {
        if let Some(id) = msg.request_id() {
            self.tasks.remove(&id);
        }
        update::update(&mut self.state, msg)
    }

    fn track(&mut self, id: RequestId, task: Task<Msg>) -> Task<Msg> {
        let (task, handle) = task.abortable();
        self.tasks.insert(id, handle.abort_on_drop());
        task
    }
}

pub enum Page {
    Launcher,
    Scanner(ScannerScreen),
}

pub struct App {
    pub core: app::Core,
    pub config: SnapTextConfig,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub page: Page,
}

#[derive(Debug, Clone)]
pub enum Msg {
    /// Launcher button
    OpenScanner,
    /// Leave the capture screen
    NavigateBack,
    /// Switch between last-block and full-text output and persist it
    ToggleTextOutput,
    Scanner(messages::Msg),
}

impl cosmic::Application for App {
    type Executor = cosmic::executor::Default;

    type Flags = ();

    type Message = Msg;

    const APP_ID: &'static str = APP_ID;

    fn core(&self) -> &app::Core {
        &self.core
    }

    fn core_mut(&mut self) -> &mut app::Core {
        &mut self.core
    }

    fn init(
        core: app::Core,
        _flags: Self::Flags,
    ) -> (Self, cosmic::iced::Task<cosmic::Action<Self::Message>>) {
        let config = SnapTextConfig::load();
        log::info!(
            "Starting with {:?} output, OCR language {:?}, camera {:?}",
            config.text_output,
            config.ocr_language,
            config.camera_access()
        );
        let recognizer: Arc<dyn TextRecognizer> = Arc::new(config.recognizer());

        (
            Self {
                core,
                config,
                recognizer,
                page: Page::Launcher,
            },
            cosmic::iced::Task::none(),
        )
    }

    fn view(&self) -> cosmic::Element<'_, Self::Message> {
        match &self.page {
            Page::Launcher => crate::widget::launcher::view(Msg::OpenScanner),
            Page::Scanner(screen) => {
                crate::widget::scanner::view(
                    &screen.state,
                    Msg::NavigateBack,
                    Msg::ToggleTextOutput,
                    Msg::Scanner,
                )
            }
        }
    }

    fn update(
        &mut self,
        message: Self::Message,
    ) -> cosmic::iced::Task<cosmic::Action<Self::Message>> {
        match message {
            Msg::OpenScanner => {
                log::info!("Opening capture screen");
                self.page = Page::Scanner(ScannerScreen::new(self.config.text_output));
                Task::none()
            }
            Msg::NavigateBack => {
                if let Page::Scanner(screen) = std::mem::replace(&mut self.page, Page::Launcher) {
                    log::info!(
                        "Closing capture screen, aborting {} pending task(s)",
                        screen.tasks.len()
                    );
                }
                Task::none()
            }
            Msg::ToggleTextOutput => {
                self.config.text_output = self.config.text_output.next();
                log::info!("Text output set to {:?}", self.config.text_output);
                self.config.save();
                if let Page::Scanner(screen) = &mut self.page {
                    screen.state.text_output = self.config.text_output;
                }
                Task::none()
            }
            Msg::Scanner(msg) => {
                let Page::Scanner(screen) = &mut self.page else {
                    log::debug!(
                        "Dropping capture screen message for request {:?}, screen is closed",
                        msg.request_id()
                    );
                    return Task::none();
                };
                let effects = screen.receive(msg);
                dispatch(screen, &self.config, &self.recognizer, effects).map(cosmic::Action::App)
            }
        }
    }
}

/// Turn state machine effects into tasks bound to the screen's lifetime
fn dispatch(
    screen: &mut ScannerScreen,
    config: &SnapTextConfig,
    recognizer: &Arc<dyn TextRecognizer>,
    effects: Vec<Effect>,
) -> Task<Msg> {
    let mut cmds: Vec<Task<Msg>> = Vec::with_capacity(effects.len());

    for effect in effects {
        match effect {
            Effect::CheckPermission(id) => {
                let access = config.camera_access();
                cmds.push(screen.track(
                    id,
                    Task::perform(async move { access.status().await }, move |status| {
                        Msg::Scanner(messages::Msg::PermissionChecked(id, status))
                    }),
                ));
            }
            Effect::RequestPermission(id) => {
                let access = config.camera_access();
                cmds.push(screen.track(
                    id,
                    Task::perform(async move { access.request().await }, move |outcome| {
                        Msg::Scanner(messages::Msg::PermissionResolved(id, outcome))
                    }),
                ));
            }
            Effect::OpenCamera(id) => {
                let access = config.camera_access();
                let options = config.capture_options();
                cmds.push(screen.track(
                    id,
                    Task::perform(camera::capture_still(access, options), move |outcome| {
                        Msg::Scanner(messages::Msg::CameraReturned(id, outcome))
                    }),
                ));
            }
            Effect::Recognize {
                id,
                image,
                rotation,
            } => {
                let recognizer = Arc::clone(recognizer);
                cmds.push(screen.track(
                    id,
                    Task::perform(
                        async move {
                            tokio::task::spawn_blocking(move || {
                                match recognizer.recognize(&image, rotation) {
                                    Ok(text) => RecognitionOutcome::Recognized(text),
                                    Err(err) => RecognitionOutcome::Failed(format!("{:#}", err)),
                                }
                            })
                            .await
                            .unwrap_or_else(|_| {
                                RecognitionOutcome::Failed("OCR task panicked".to_string())
                            })
                        },
                        move |outcome| Msg::Scanner(messages::Msg::RecognitionFinished(id, outcome)),
                    ),
                ));
            }
            Effect::Cancel(id) => {
                if screen.tasks.remove(&id).is_some() {
                    log::debug!("Aborted task for {:?}", id);
                }
            }
            Effect::ShowNotice(notice) => {
                let duration = config.notice_duration();
                let screen_id = screen.state.requests.screen();
                let (task, handle) = Task::perform(
                    async move { tokio::time::sleep(duration).await },
                    move |_| Msg::Scanner(messages::Msg::NoticeExpired(screen_id, notice.id)),
                )
                .abortable();
                screen.notice_timer = Some(handle.abort_on_drop());
                cmds.push(task);
            }
            Effect::CopyToClipboard(text) => {
                cmds.push(clipboard::write(text));
            }
        }
    }

    Task::batch(cmds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ocr::{RecognizedText, Rotation};
    use crate::session::requests::RequestKind;
    use crate::session::state::NoticeKind;
    use image::RgbaImage;

    struct BlankRecognizer;

    impl TextRecognizer for BlankRecognizer {
        fn recognize(&self, _image: &RgbaImage, _rotation: Rotation) -> anyhow::Result<RecognizedText> {
            Ok(RecognizedText::default())
        }
    }

    fn run(screen: &mut ScannerScreen, effects: Vec<Effect>) {
        let recognizer: Arc<dyn TextRecognizer> = Arc::new(BlankRecognizer);
        let _ = dispatch(screen, &SnapTextConfig::default(), &recognizer, effects);
    }

    fn recognize(screen: &mut ScannerScreen) -> RequestId {
        let (id, _) = screen.state.requests.issue(RequestKind::Recognition);
        run(
            screen,
            vec![Effect::Recognize {
                id,
                image: RgbaImage::new(1, 1),
                rotation: Rotation::None,
            }],
        );
        id
    }

    #[test]
    fn test_recognition_task_tracked_until_cancelled() {
        let mut screen = ScannerScreen::new(TextOutput::LastBlock);
        let id = recognize(&mut screen);
        assert!(screen.tasks.contains_key(&id));

        run(&mut screen, vec![Effect::Cancel(id)]);
        assert!(screen.tasks.is_empty());
    }

    #[test]
    fn test_superseded_recognition_releases_old_task() {
        let mut screen = ScannerScreen::new(TextOutput::LastBlock);
        screen.state.image = crate::session::state::ImageSlot::Captured(
            crate::capture::image::CapturedImage::new(RgbaImage::new(2, 2)),
        );
        let first = recognize(&mut screen);

        let effects = screen.receive(messages::Msg::DetectRequested);
        run(&mut screen, effects);

        assert!(!screen.tasks.contains_key(&first));
        assert_eq!(screen.tasks.len(), 1);
        assert!(screen.state.requests.is_pending(RequestKind::Recognition));
    }

    #[test]
    fn test_delivered_result_releases_its_task() {
        let mut screen = ScannerScreen::new(TextOutput::LastBlock);
        let id = recognize(&mut screen);

        let effects = screen.receive(messages::Msg::RecognitionFinished(
            id,
            RecognitionOutcome::Recognized(RecognizedText::default()),
        ));
        assert!(screen.tasks.is_empty());
        assert_eq!(
            screen.state.notice.map(|notice| notice.kind),
            Some(NoticeKind::NoTextFound)
        );

        assert!(screen.notice_timer.is_none());
        run(&mut screen, effects);
        assert!(screen.notice_timer.is_some());
        assert!(screen.tasks.is_empty(), "notice timers are not request tasks");
    }
}
