use anyhow::Result;

use super::controller::SessionController;

/// The keyboard surface, decoupled from key capture: the host maps chords to
/// commands and hands them to [`SessionController::dispatch`]. Free-text
/// input (labels, import files) is collected by the host before dispatching.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddBookmark,
    LabelBookmark { label: String },
    NavigateNext,
    NavigatePrev,
    RemoveCurrent,
    RemoveAt { index: usize },
    Undo,
    ClearAll,
    Import { text: String },
    SetSpeedPreset { preset: u8 },
    SpeedUp,
    SpeedDown,
    ToggleOverlay,
    ShowHelp,
}

/// What a command did, for the host's feedback overlays.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done,
    /// Valid command with nothing to do: duplicate bookmark, empty list,
    /// empty undo stack, or no active session.
    Ignored,
    SeekedTo(u32),
    SpeedSet(f64),
    Imported(usize),
    OverlayVisible(bool),
    Help(&'static str),
}

impl SessionController {
    pub async fn dispatch(&self, command: Command) -> Result<Outcome> {
        match command {
            Command::AddBookmark => Ok(match self.add_bookmark().await? {
                Some(_) => Outcome::Done,
                None => Outcome::Ignored,
            }),
            Command::LabelBookmark { label } => Ok(if self.label_current(&label).await? {
                Outcome::Done
            } else {
                Outcome::Ignored
            }),
            Command::NavigateNext => Ok(match self.navigate_next().await {
                Some(time) => Outcome::SeekedTo(time),
                None => Outcome::Ignored,
            }),
            Command::NavigatePrev => Ok(match self.navigate_prev().await {
                Some(time) => Outcome::SeekedTo(time),
                None => Outcome::Ignored,
            }),
            Command::RemoveCurrent => Ok(if self.remove_current().await? {
                Outcome::Done
            } else {
                Outcome::Ignored
            }),
            Command::RemoveAt { index } => Ok(match self.remove_at(index).await? {
                Some(_) => Outcome::Done,
                None => Outcome::Ignored,
            }),
            Command::Undo => Ok(match self.undo().await? {
                Some(_) => Outcome::Done,
                None => Outcome::Ignored,
            }),
            Command::ClearAll => Ok(if self.clear_all().await? {
                Outcome::Done
            } else {
                Outcome::Ignored
            }),
            Command::Import { text } => Ok(Outcome::Imported(self.import(&text).await?)),
            Command::SetSpeedPreset { preset } => {
                Ok(Outcome::SpeedSet(self.set_speed_preset(preset).await?))
            }
            Command::SpeedUp => Ok(Outcome::SpeedSet(self.speed_up().await?)),
            Command::SpeedDown => Ok(Outcome::SpeedSet(self.speed_down().await?)),
            Command::ToggleOverlay => Ok(Outcome::OverlayVisible(self.toggle_overlay())),
            Command::ShowHelp => Ok(Outcome::Help(self.help_text())),
        }
    }
}
