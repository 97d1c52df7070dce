use crate::{
    core::IdentityState,
    gui::{
        screens::{ScreenMessage, form_page::FormScreen, landing_page::LandingPageScreen},
        state::Services,
    },
};

#[derive(Debug, Clone)]
pub enum Message {
    Connected(Result<Services, String>),
    IdentityChanged(IdentityState),
    LandingPage(ScreenMessage<LandingPageScreen>),
    FormPage(ScreenMessage<FormScreen>),
}
