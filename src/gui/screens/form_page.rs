use iced::{
    Element, Length, Task,
    widget::{Column, Row, button, column, container, pick_list, row, text, text_input},
};
use time::OffsetDateTime;
use tracing::warn;

use crate::{
    core::{
        FailureKind, Field, FormState, StoreError, WrapCoverage, store::RecordUpdate,
    },
    gui::{
        AppState,
        screens::{Screen, ScreenMessage},
        widgets::{Step, modal, wizard_layout},
    },
};

#[derive(Debug, Clone)]
pub struct FormScreen;

#[derive(Debug, Clone)]
pub enum FormMessage {
    FieldChanged(Field, String),
    CoverageSelected(WrapCoverage),
    Next,
    Back,
    Confirm,
    Submitted(Result<(), StoreError>),
    RecordPushed(RecordUpdate),
    Retry,
    Resubmit,
    DismissNotice,
}

#[derive(Debug, Clone)]
pub enum ParentMessage {
    Home,
}

type Msg = ScreenMessage<FormScreen>;

fn local(message: FormMessage) -> Msg {
    ScreenMessage::ScreenMessage(message)
}

impl Screen for FormScreen {
    type Message = FormMessage;
    type ParentMessage = ParentMessage;

    fn view<'a>(&'a self, state: &'a AppState) -> Element<'a, ScreenMessage<Self>> {
        let form_state = state.form.state();
        let step = form_state.step_number().and_then(Step::from_number);
        let content: Element<'a, Msg> = match form_state {
            FormState::Personal => inputs(state, "Tell us about yourself", &Field::PERSONAL, None),
            FormState::Vehicle => inputs(
                state,
                "Tell us about your vehicle",
                &Field::VEHICLE,
                Some(coverage_picker(state)),
            ),
            FormState::Review => review(state),
            FormState::Submitting => {
                column![text("Submitting your registration..."), nav_row(state)]
                    .spacing(16)
                    .into()
            }
            FormState::Success => success(state),
            FormState::Failed(kind) => failed(state, kind),
            // `View::from` never shows the form on landing.
            FormState::Landing => text("").into(),
        };
        wizard_layout(step, content)
    }

    fn update(
        &mut self,
        message: Self::Message,
        state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        // Rejected actions leave their reason in the machine's notice.
        let result = match message {
            FormMessage::FieldChanged(field, value) => state.form.set_field(field, value),
            FormMessage::CoverageSelected(coverage) => state.form.set_coverage(Some(coverage)),
            FormMessage::Next => state.form.next().map(|_| ()),
            FormMessage::Back => state.form.back().map(|_| ()),
            FormMessage::Confirm => return confirm(state),
            FormMessage::Submitted(result) => state.form.finish_submit(result).map(|_| ()),
            FormMessage::RecordPushed(update) => {
                match update {
                    Ok(record) => {
                        state.form.hydrate(record.as_ref());
                    }
                    Err(err) => warn!("Record feed error: {err}"),
                }
                Ok(())
            }
            FormMessage::Retry => state.form.retry(),
            FormMessage::Resubmit => match state.form.retry() {
                Ok(()) => return confirm(state),
                Err(err) => Err(err),
            },
            FormMessage::DismissNotice => {
                state.form.dismiss_notice();
                Ok(())
            }
        };
        if let Err(err) = result {
            warn!(kind = ?err.kind(), "Form action rejected: {err}");
        }
        Task::none()
    }
}

fn confirm(state: &mut AppState) -> Task<Msg> {
    let Some(services) = &state.services else {
        return Task::none();
    };
    let records = services.records.clone();
    let subject = records.subject().ok();
    match state.form.confirm(subject.as_ref(), OffsetDateTime::now_utc()) {
        Ok(record) => {
            state.submitted = Some(record.clone());
            Task::perform(async move { records.upsert_record(&record).await }, |result| {
                local(FormMessage::Submitted(result))
            })
        }
        Err(err) => {
            warn!(kind = ?err.kind(), "Confirm rejected: {err}");
            Task::none()
        }
    }
}

/// Appends the inline error from the last rejected action, if any.
fn with_notice<'a>(page: Column<'a, Msg>, state: &'a AppState) -> Column<'a, Msg> {
    match state.form.notice() {
        Some(err) => page.push(
            row![
                text(err.user_message()).width(Length::Fill),
                button("Dismiss").on_press(local(FormMessage::DismissNotice)),
            ]
            .spacing(10),
        ),
        None => page,
    }
}

fn inputs<'a>(
    state: &'a AppState,
    heading: &'a str,
    fields: &'a [Field],
    extra: Option<Element<'a, Msg>>,
) -> Element<'a, Msg> {
    let draft = state.form.draft();
    let rows = fields.iter().map(|field| {
        let field = *field;
        let input: Element<'a, Msg> = column![
            text(field.label()).size(14),
            text_input(field.label(), draft.get(field))
                .on_input(move |value| local(FormMessage::FieldChanged(field, value)))
                .on_submit(local(FormMessage::Next))
                .padding(10),
        ]
        .spacing(4)
        .into();
        input
    });

    let mut page = Column::new().push(text(heading).size(26)).extend(rows);
    if let Some(extra) = extra {
        page = page.push(extra);
    }
    with_notice(page, state)
        .push(nav_row(state))
        .spacing(16)
        .into()
}

/// Buttons under each form screen. Every form screen can go home.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nav {
    Home,
    Back,
    Next,
    Confirm,
    Resubmit,
    /// Leaves a failure for the review step, keeping the draft.
    Close,
}

fn nav_buttons(form_state: FormState) -> &'static [Nav] {
    match form_state {
        FormState::Landing => &[],
        FormState::Personal => &[Nav::Home, Nav::Next],
        FormState::Vehicle => &[Nav::Home, Nav::Back, Nav::Next],
        FormState::Review => &[Nav::Home, Nav::Back, Nav::Confirm],
        FormState::Submitting | FormState::Success => &[Nav::Home],
        FormState::Failed(FailureKind::Denied) => &[Nav::Close, Nav::Home],
        FormState::Failed(_) => &[Nav::Resubmit, Nav::Close, Nav::Home],
    }
}

fn nav_button(nav: Nav, state: &AppState) -> Element<'_, Msg> {
    match nav {
        Nav::Home => button("Home").on_press(ScreenMessage::ParentMessage(ParentMessage::Home)),
        Nav::Back => button("Back").on_press(local(FormMessage::Back)),
        Nav::Next => button("Next").on_press(local(FormMessage::Next)),
        Nav::Confirm if state.identity.ready => {
            button("Confirm & submit").on_press(local(FormMessage::Confirm))
        }
        Nav::Confirm => button("Waiting for sign-in..."),
        Nav::Resubmit => button("Retry").on_press(local(FormMessage::Resubmit)),
        Nav::Close => {
            let label = match state.form.state() {
                FormState::Failed(FailureKind::Denied) => "Back to review",
                _ => "Close",
            };
            button(label).on_press(local(FormMessage::Retry))
        }
    }
    .into()
}

fn nav_row(state: &AppState) -> Row<'_, Msg> {
    let buttons = nav_buttons(state.form.state())
        .iter()
        .map(|nav| nav_button(*nav, state));
    Row::with_children(buttons).spacing(10)
}

fn coverage_picker(state: &AppState) -> Element<'_, Msg> {
    column![
        text("Wrap coverage").size(14),
        pick_list(WrapCoverage::ALL, state.form.draft().coverage, |coverage| {
            local(FormMessage::CoverageSelected(coverage))
        })
        .placeholder("Choose a coverage option"),
    ]
    .spacing(4)
    .into()
}

fn summary(state: &AppState) -> Column<'_, Msg> {
    let draft = state.form.draft();
    let coverage = draft
        .coverage
        .map(WrapCoverage::label)
        .unwrap_or("No preference");
    Field::PERSONAL
        .iter()
        .chain(Field::VEHICLE.iter())
        .fold(Column::new().spacing(6), |column, field| {
            column.push(text(format!("{}: {}", field.label(), draft.get(*field).trim())))
        })
        .push(text(format!("Wrap coverage: {coverage}")))
}

fn review(state: &AppState) -> Element<'_, Msg> {
    let page = column![text("Review your registration").size(26), summary(state)];
    with_notice(page, state)
        .push(nav_row(state))
        .spacing(16)
        .into()
}

fn success(state: &AppState) -> Element<'_, Msg> {
    let name = state
        .submitted
        .as_ref()
        .map(|record| record.full_name.as_str())
        .unwrap_or("driver");
    column![
        text("You're registered!").size(26),
        text(format!(
            "Thanks, {name}. We'll match your vehicle with a campaign and be in touch."
        )),
        nav_row(state),
    ]
    .spacing(16)
    .into()
}

fn failed(state: &AppState, kind: FailureKind) -> Element<'_, Msg> {
    let message = state
        .form
        .notice()
        .map(|err| err.user_message())
        .unwrap_or_default();
    match kind {
        FailureKind::Denied => column![
            text("Registration not saved").size(26),
            text(message),
            nav_row(state),
        ]
        .spacing(16)
        .into(),
        FailureKind::NotReady | FailureKind::Unavailable => {
            let dialog = container(
                column![
                    text("Something went wrong").size(22),
                    text(message),
                    nav_row(state),
                ]
                .spacing(12),
            )
            .padding(20)
            .max_width(420.0)
            .style(container::rounded_box);
            modal(
                column![text("Review your registration").size(26), summary(state)].spacing(16),
                dialog,
                local(FormMessage::Retry),
            )
        }
    }
}
