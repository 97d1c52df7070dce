use iced::{
    Alignment::Center,
    Element, Length, Task,
    widget::{Column, Row, button, column, container, scrollable, text},
};

use crate::{
    core::content::{self, LandingSection},
    gui::{
        AppState,
        screens::{Screen, ScreenMessage},
        widgets::card,
    },
};

#[derive(Debug, Clone)]
pub struct LandingPageScreen;

#[derive(Debug, Clone)]
pub enum LandingPageMessage {}

#[derive(Debug, Clone)]
pub enum ParentMessage {
    StartRegistration,
}

impl Screen for LandingPageScreen {
    type Message = LandingPageMessage;
    type ParentMessage = ParentMessage;

    fn view<'a>(&'a self, state: &'a AppState) -> Element<'a, ScreenMessage<Self>> {
        // Nothing can be saved until the visitor has an identity.
        let start = if state.identity.ready {
            button(content::CALL_TO_ACTION)
                .on_press(ScreenMessage::ParentMessage(ParentMessage::StartRegistration))
        } else {
            button("Connecting...")
        };

        let header = column![
            text(content::BRAND).size(40),
            text(content::TAGLINE).size(18),
            start.padding([12, 32]),
        ]
        .spacing(16)
        .align_x(Center);

        let sections = content::SECTIONS.iter().map(section);

        let page = Column::new()
            .push(container(header).padding(24).center_x(Length::Fill))
            .extend(sections)
            .push(
                container(text(content::current_footer()).size(14))
                    .padding(16)
                    .center_x(Length::Fill),
            )
            .spacing(40)
            .padding(20)
            .max_width(720.0);

        container(scrollable(container(page).center_x(Length::Fill)))
            .width(Length::Fill)
            .height(Length::Fill)
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

fn section<'a, Message: 'a>(section: &'a LandingSection) -> Element<'a, Message> {
    let items = section.items.iter().enumerate().map(|(i, feature)| {
        let title = if section.numbered {
            format!("{}. {}", i + 1, feature.title)
        } else {
            feature.title.to_string()
        };
        card(title, feature.description)
    });

    let body: Element<'a, Message> = if section.numbered {
        Column::with_children(items).spacing(16).into()
    } else {
        Row::with_children(items).spacing(16).into()
    };

    column![text(section.heading).size(26), body]
        .spacing(20)
        .align_x(Center)
        .into()
}
