use std::convert::Infallible;

use iced::{
    Element, Task,
    widget::{column, container, text},
};

use crate::gui::{
    AppState,
    screens::{Screen, ScreenMessage},
};

#[derive(Debug, Clone, Default)]
pub struct LoadingPageScreen {
    pub error: Option<String>,
}

impl Screen for LoadingPageScreen {
    type Message = Infallible;
    type ParentMessage = Infallible;

    fn view<'a>(&'a self, _state: &'a AppState) -> Element<'a, ScreenMessage<Self>> {
        let content: Element<'a, ScreenMessage<Self>> = match &self.error {
            Some(err) => column![
                text("Could not open the registration store").size(24),
                text(err.as_str()),
            ]
            .spacing(10)
            .into(),
            None => text("Loading...").into(),
        };
        container(content)
            .center_x(iced::Length::Fill)
            .center_y(iced::Length::Fill)
            .into()
    }

    fn update(
        &mut self,
        message: Self::Message,
        _state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match message {}
    }
}
