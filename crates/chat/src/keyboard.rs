//! Reply keyboards: the button grid shown under the message box.

use riego_core::flows::menu::{
    CANCEL, CONTROL_PANEL, DOCUMENTATION, HELP, INCIDENTS, IRRIGATION_IMPROVEMENT,
    IRRIGATION_MANAGEMENT, MAINTENANCE, NO, OPEN_ALERTS, REGISTER_DRIPPER_CV, REGISTER_HEAD,
    REGISTER_PUMP, REGISTER_SECTOR, REVIEW, SKIP, YES,
};
use riego_core::flows::Keyboard;
use serde::Serialize;
use serde_json::Value;

const OPTIONS_PER_ROW: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyboardLayout {
    pub rows: Vec<Vec<String>>,
    /// Hide the keyboard once a button is pressed.
    pub one_time: bool,
}

impl KeyboardLayout {
    fn persistent(rows: &[&[&str]]) -> Self {
        Self { rows: owned(rows), one_time: false }
    }

    fn one_time(rows: &[&[&str]]) -> Self {
        Self { rows: owned(rows), one_time: true }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(String::as_str)
    }
}

fn owned(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter().map(|row| row.iter().map(|label| (*label).to_owned()).collect()).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyMarkup {
    Keyboard(KeyboardLayout),
    Unchanged,
}

impl ReplyMarkup {
    pub fn from_keyboard(keyboard: &Keyboard) -> Self {
        let layout = match keyboard {
            Keyboard::MainMenu => KeyboardLayout::persistent(&[
                &[IRRIGATION_MANAGEMENT],
                &[IRRIGATION_IMPROVEMENT, DOCUMENTATION],
                &[HELP],
            ]),
            Keyboard::ManagementMenu => KeyboardLayout::persistent(&[
                &[CONTROL_PANEL],
                &[REVIEW, MAINTENANCE],
                &[INCIDENTS],
                &[CANCEL],
            ]),
            Keyboard::ReviewMenu => KeyboardLayout::persistent(&[
                &[REGISTER_SECTOR, REGISTER_HEAD],
                &[REGISTER_PUMP, REGISTER_DRIPPER_CV, CANCEL],
            ]),
            Keyboard::MaintenanceMenu => {
                KeyboardLayout::persistent(&[&[OPEN_ALERTS], &[CANCEL]])
            }
            Keyboard::Cancel => KeyboardLayout::one_time(&[&[CANCEL]]),
            Keyboard::CancelOrSkip => KeyboardLayout::one_time(&[&[SKIP, CANCEL]]),
            Keyboard::YesNo => KeyboardLayout::one_time(&[&[YES], &[NO], &[CANCEL]]),
            Keyboard::Options(labels) => options_layout(labels),
            Keyboard::Unchanged => return Self::Unchanged,
        };
        Self::Keyboard(layout)
    }

    /// Telegram `reply_markup` object, or `None` to leave the client's keyboard alone.
    pub fn to_telegram(&self) -> Option<Value> {
        match self {
            Self::Keyboard(layout) => serde_json::to_value(TelegramReplyKeyboard {
                keyboard: &layout.rows,
                resize_keyboard: true,
                one_time_keyboard: layout.one_time,
            })
            .ok(),
            Self::Unchanged => None,
        }
    }
}

#[derive(Serialize)]
struct TelegramReplyKeyboard<'a> {
    keyboard: &'a [Vec<String>],
    resize_keyboard: bool,
    one_time_keyboard: bool,
}

fn options_layout(labels: &[String]) -> KeyboardLayout {
    let mut rows: Vec<Vec<String>> =
        labels.chunks(OPTIONS_PER_ROW).map(<[String]>::to_vec).collect();
    rows.push(vec![CANCEL.to_owned()]);
    KeyboardLayout { rows, one_time: true }
}
