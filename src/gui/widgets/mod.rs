use iced::{
    Color, Element, Length, Theme, border,
    widget::{
        Row, center, column, container, container::Style, mouse_area, opaque, stack, text,
    },
};
use iced_widget::container::bordered_box;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Personal,
    Vehicle,
    Review,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Personal, Step::Vehicle, Step::Review];

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Step::Personal),
            2 => Some(Step::Vehicle),
            3 => Some(Step::Review),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Step::Personal => "1. Personal details",
            Step::Vehicle => "2. Vehicle details",
            Step::Review => "3. Review & submit",
        }
    }

    fn style(self, other: Self) -> impl Fn(&Theme) -> Style {
        move |theme: &Theme| {
            let width = if self == other { 3 } else { 1 };
            let style = bordered_box(theme).border(border::width(width));
            // if done, gray out background
            if self > other {
                let mut color_rgba = theme.palette().background.into_rgba8();
                color_rgba[0] /= 2;
                color_rgba[1] /= 2;
                color_rgba[2] /= 2;
                style.background(Color::from_rgb8(color_rgba[0], color_rgba[1], color_rgba[2]))
            } else {
                style.background(theme.palette().background)
            }
        }
    }
}

/// Progress indicator above the current step's content.
pub fn wizard_layout<'a, Message>(
    step: Option<Step>,
    main_content: impl Into<Element<'a, Message>>,
) -> Element<'a, Message>
where
    Message: 'a,
{
    let progress = Row::with_children(Step::ALL.into_iter().map(|other| {
        let tile = container(text(other.label())).padding(10).width(Length::Fill);
        let tile: Element<'a, Message> = match step {
            Some(step) => tile.style(step.style(other)).into(),
            None => tile.style(bordered_box).into(),
        };
        tile
    }))
    .spacing(8);

    container(
        column![progress, container(main_content.into()).padding(20)]
            .spacing(20)
            .max_width(720.0),
    )
    .padding(20)
    .center_x(Length::Fill)
    .into()
}

pub fn card<'a, Message: 'a>(title: String, description: &'a str) -> Element<'a, Message> {
    container(column![text(title).size(20), text(description).size(14)].spacing(8))
        .padding(16)
        .width(Length::Fill)
        .style(bordered_box)
        .into()
}

/// Overlays `content` on a dimmed `base`; clicking outside sends `on_blur`.
pub fn modal<'a, Message>(
    base: impl Into<Element<'a, Message>>,
    content: impl Into<Element<'a, Message>>,
    on_blur: Message,
) -> Element<'a, Message>
where
    Message: Clone + 'a,
{
    stack![
        base.into(),
        opaque(
            mouse_area(center(opaque(content)).style(|_theme| {
                Style {
                    background: Some(
                        Color {
                            a: 0.8,
                            ..Color::BLACK
                        }
                        .into(),
                    ),
                    ..Style::default()
                }
            }))
            .on_press(on_blur)
        )
    ]
    .into()
}
