use futures::stream;
use iced::{Element, Task};
use tracing::info;

use crate::{
    config::AppConfig,
    core::content::BRAND,
    gui::{
        AppState, Message,
        screens::{Screen, ScreenData, ScreenMessage, loading_page::LoadingPageScreen},
        state::Services,
    },
};

pub struct WrapRewardsApp {
    screen: ScreenData,
    state: AppState,
}

impl WrapRewardsApp {
    pub fn new(config: AppConfig) -> (Self, Task<Message>) {
        let connect = Task::perform(Services::connect(config.clone()), |result| {
            Message::Connected(result.map_err(|e| format!("{e:#}")))
        });
        (
            Self {
                screen: ScreenData::LoadingPage(LoadingPageScreen::default()),
                state: AppState::new(config),
            },
            connect,
        )
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        self.screen
            .update(message, &mut self.state)
            .map(|message| match message {
                ScreenMessage::ScreenMessage(message) => message,
                ScreenMessage::ParentMessage(never) => match never {},
            })
    }

    pub fn view(&self) -> Element<'_, Message> {
        self.screen.view(&self.state).map(|message| match message {
            ScreenMessage::ScreenMessage(message) => message,
            ScreenMessage::ParentMessage(never) => match never {},
        })
    }
}

/// Forwards identity readiness and subject changes into the UI.
pub(super) fn watch_identity(services: &Services) -> Task<Message> {
    let changes = services.session.changes();
    let identity = stream::unfold(changes, |mut changes| async move {
        changes.changed().await.ok()?;
        let state = changes.borrow_and_update().clone();
        Some((state, changes))
    });
    let session = services.session.clone();
    Task::batch([
        Task::run(identity, Message::IdentityChanged),
        Task::future(async move { session.resolve().await }).discard(),
    ])
}

pub fn run(config: AppConfig) -> iced::Result {
    info!(namespace = %config.namespace, "Starting {BRAND}");
    iced::application(
        move || WrapRewardsApp::new(config.clone()),
        WrapRewardsApp::update,
        WrapRewardsApp::view,
    )
    .title(BRAND)
    .run()
}
