pub mod form_page;
pub mod landing_page;
pub mod loading_page;

use iced::{Element, Task};
use tracing::{info, warn};

use crate::{
    core::View,
    gui::{AppState, Message, app::watch_identity},
};

#[derive(Debug, Clone)]
pub enum ScreenMessage<S: Screen> {
    ScreenMessage(S::Message),
    ParentMessage(S::ParentMessage),
}

pub trait Screen: Sized {
    type Message: std::fmt::Debug + Clone;
    type ParentMessage: std::fmt::Debug + Clone;
    fn view<'a>(&'a self, state: &'a AppState) -> Element<'a, ScreenMessage<Self>>;
    fn update(&mut self, message: Self::Message, state: &mut AppState)
    -> Task<ScreenMessage<Self>>;
}

/// Top-level screen. Once connected, landing vs form follows the form state alone.
#[derive(Debug, Clone)]
pub enum ScreenData {
    LoadingPage(loading_page::LoadingPageScreen),
    Connected {
        landing: landing_page::LandingPageScreen,
        form: form_page::FormScreen,
    },
}

impl ScreenData {
    pub fn connected() -> Self {
        ScreenData::Connected {
            landing: landing_page::LandingPageScreen,
            form: form_page::FormScreen,
        }
    }

    /// The view shown for `state`; `None` while still loading.
    pub fn current_view(&self, state: &AppState) -> Option<View> {
        match self {
            ScreenData::LoadingPage(_) => None,
            ScreenData::Connected { .. } => Some(View::from(state.form.state())),
        }
    }
}

fn to_form(message: form_page::FormMessage) -> ScreenMessage<ScreenData> {
    ScreenMessage::ScreenMessage(Message::FormPage(ScreenMessage::ScreenMessage(message)))
}

fn feed_to_form(state: &mut AppState) -> Task<ScreenMessage<ScreenData>> {
    state
        .open_feed()
        .map(|update| to_form(form_page::FormMessage::RecordPushed(update)))
}

impl Screen for ScreenData {
    type Message = Message;
    type ParentMessage = std::convert::Infallible;

    fn view<'a>(&'a self, state: &'a AppState) -> Element<'a, ScreenMessage<Self>> {
        match self {
            ScreenData::LoadingPage(screen) => screen.view(state).map(|msg| match msg {
                ScreenMessage::ScreenMessage(never) | ScreenMessage::ParentMessage(never) => {
                    match never {}
                }
            }),
            ScreenData::Connected { landing, form } => match View::from(state.form.state()) {
                View::Landing => landing.view(state).map(Message::LandingPage),
                View::Form => form.view(state).map(Message::FormPage),
            },
        }
        .map(ScreenMessage::ScreenMessage)
    }

    fn update(
        &mut self,
        message: Self::Message,
        state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match (self, message) {
            (x, Message::Connected(Ok(services))) => {
                info!("Services connected");
                let identity = watch_identity(&services);
                state.services = Some(services);
                *x = ScreenData::connected();
                identity.map(ScreenMessage::ScreenMessage)
            }
            (ScreenData::LoadingPage(page), Message::Connected(Err(err))) => {
                warn!("Could not connect: {err}");
                page.error = Some(err);
                Task::none()
            }
            (_, Message::IdentityChanged(identity)) => {
                let subject_changed = identity.subject != state.identity.subject;
                state.identity = identity;
                // A new subject means a different document; follow it while the form is open.
                if subject_changed && View::from(state.form.state()) == View::Form {
                    feed_to_form(state)
                } else {
                    Task::none()
                }
            }
            (ScreenData::Connected { landing, .. }, Message::LandingPage(msg)) => match msg {
                ScreenMessage::ScreenMessage(msg) => landing
                    .update(msg, state)
                    .map(Message::LandingPage)
                    .map(ScreenMessage::ScreenMessage),
                ScreenMessage::ParentMessage(landing_page::ParentMessage::StartRegistration) => {
                    if let Err(err) = state.form.start(None) {
                        warn!("Cannot start registration: {err}");
                        return Task::none();
                    }
                    state.submitted = None;
                    feed_to_form(state)
                }
            },
            (ScreenData::Connected { form, .. }, Message::FormPage(msg)) => match msg {
                ScreenMessage::ScreenMessage(msg) => form
                    .update(msg, state)
                    .map(Message::FormPage)
                    .map(ScreenMessage::ScreenMessage),
                ScreenMessage::ParentMessage(form_page::ParentMessage::Home) => {
                    state.form.home();
                    state.close_feed();
                    Task::none()
                }
            },
            _ => Task::none(),
        }
    }
}
