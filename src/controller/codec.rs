//! Wire encoding for button and stick state
//!
//! Two button encodings exist:
//!
//! - **Positional** (default): 7 characters in canonical order, the button's
//!   letter when pressed and `-` when released, e.g. `"A-----Z"`.
//! - **Hex**: the 7 button bits packed into one byte (bit 0 = A … bit 6 = Z)
//!   and written as 2 lowercase hex digits, e.g. `"41"`.
//!
//! The two are not compatible with each other; both nodes of a pair must use
//! the same [`WireFormat`]. The stick travels as `"<x>,<y>"`.
//!
//! Decoding never fails. Anything missing or malformed decodes to "not
//! pressed" for buttons and to the previous value for stick axes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::state::{ButtonId, ButtonSet, StickPosition};

const RELEASED: char = '-';

// Button encoding used by both nodes of a pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    #[default]
    Positional,
    Hex,
}

impl WireFormat {
    pub fn encode_buttons(self, buttons: ButtonSet) -> String {
        match self {
            WireFormat::Positional => encode_buttons(buttons),
            WireFormat::Hex => encode_buttons_hex(buttons),
        }
    }

    pub fn decode_buttons(self, text: &str) -> ButtonSet {
        match self {
            WireFormat::Positional => decode_buttons(text),
            WireFormat::Hex => decode_buttons_hex(text),
        }
    }
}

pub fn encode_buttons(buttons: ButtonSet) -> String {
    ButtonId::ALL
        .iter()
        .map(|button| {
            if buttons.contains(*button) {
                button.letter()
            } else {
                RELEASED
            }
        })
        .collect()
}

/// Decodes the positional encoding
///
/// Position *i* counts as pressed only if it holds the canonical letter for
/// position *i*. Missing positions are released, extra characters ignored.
pub fn decode_buttons(text: &str) -> ButtonSet {
    text.chars()
        .zip(ButtonId::ALL)
        .filter(|(c, button)| *c == button.letter())
        .map(|(_, button)| button)
        .collect()
}

pub fn encode_buttons_hex(buttons: ButtonSet) -> String {
    format!("{:02x}", buttons.bits())
}

pub fn decode_buttons_hex(text: &str) -> ButtonSet {
    let digits = text.trim();
    // from_str_radix would also take a sign
    let well_formed = (1..=2).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_hexdigit());
    if !well_formed {
        debug!("Ignoring malformed hex button state: {:?}", text);
        return ButtonSet::empty();
    }

    match u8::from_str_radix(digits, 16) {
        Ok(bits) => ButtonSet::from_bits(bits),
        Err(e) => {
            debug!("Ignoring malformed hex button state {:?}: {}", text, e);
            ButtonSet::empty()
        }
    }
}

pub fn encode_stick(stick: StickPosition) -> String {
    let stick = StickPosition::new(stick.x, stick.y);
    format!("{},{}", stick.x, stick.y)
}

/// Decodes `"<x>,<y>"` on top of the previously known position
///
/// Splits on the first comma. Without a comma the previous position is kept
/// as is; an axis that does not parse keeps its previous value.
pub fn decode_stick(text: &str, previous: StickPosition) -> StickPosition {
    let Some((x, y)) = text.split_once(',') else {
        debug!("Stick message without separator: {:?}", text);
        return previous;
    };

    let x = x.trim().parse::<i32>().unwrap_or(previous.x);
    let y = y.trim().parse::<i32>().unwrap_or(previous.y);
    StickPosition::new(x, y)
}
