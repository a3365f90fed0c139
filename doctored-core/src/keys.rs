use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Toolkit-independent key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum InputKey {
    Char(char),
    Escape,
    Enter,
    Tab,
    BackTab,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    Other,
}

impl InputKey {
    /// Same key regardless of letter case.
    pub fn same_key(&self, other: &InputKey) -> bool {
        match (self, other) {
            (InputKey::Char(a), InputKey::Char(b)) => a.to_lowercase().eq(b.to_lowercase()),
            (a, b) => a == b,
        }
    }
}

impl TryFrom<String> for InputKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();
        Ok(match lower.as_str() {
            "escape" | "esc" => InputKey::Escape,
            "enter" | "return" => InputKey::Enter,
            "tab" => InputKey::Tab,
            "backtab" | "shift+tab" => InputKey::BackTab,
            "backspace" => InputKey::Backspace,
            "up" => InputKey::Up,
            "down" => InputKey::Down,
            "left" => InputKey::Left,
            "right" => InputKey::Right,
            "space" => InputKey::Char(' '),
            _ => {
                let mut chars = value.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => InputKey::Char(c),
                    _ => return Err(format!("unknown key name `{value}`")),
                }
            }
        })
    }
}

/// Written by name. `Other` stands for any unrecognized key and has no
/// name that would read back, so it cannot be written.
impl Serialize for InputKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            InputKey::Other => Err(serde::ser::Error::custom(
                "an unrecognized key cannot be written as a binding",
            )),
            key => serializer.collect_str(key),
        }
    }
}

impl fmt::Display for InputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKey::Char(' ') => f.write_str("space"),
            InputKey::Char(c) => write!(f, "{c}"),
            InputKey::Escape => f.write_str("escape"),
            InputKey::Enter => f.write_str("enter"),
            InputKey::Tab => f.write_str("tab"),
            InputKey::BackTab => f.write_str("backtab"),
            InputKey::Backspace => f.write_str("backspace"),
            InputKey::Up => f.write_str("up"),
            InputKey::Down => f.write_str("down"),
            InputKey::Left => f.write_str("left"),
            InputKey::Right => f.write_str("right"),
            InputKey::Other => f.write_str("other"),
        }
    }
}

/// Which set of logical outcomes a key press is read against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyContext {
    /// Image trials: reject / accept / abort.
    Trial,
    /// Comprehension gate, survey and confirmations: yes / no / abort.
    YesNo,
}

/// Logical outcome of a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Image judged manipulated.
    Reject,
    /// Image judged original.
    Accept,
    Yes,
    No,
    Abort,
    Unmapped,
}

/// Physical key bindings for every logical outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyMap {
    pub reject: InputKey,
    pub accept: InputKey,
    pub yes: InputKey,
    pub no: InputKey,
    /// Extra keys read as "yes" outside the trial loop.
    pub yes_aliases: Vec<InputKey>,
    /// Extra keys read as "no" outside the trial loop.
    pub no_aliases: Vec<InputKey>,
    pub abort: InputKey,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self {
            reject: InputKey::Char('j'),
            accept: InputKey::Char('f'),
            yes: InputKey::Char('y'),
            no: InputKey::Char('n'),
            yes_aliases: vec![InputKey::Char('j')],
            no_aliases: vec![InputKey::Char('f')],
            abort: InputKey::Escape,
        }
    }
}

impl KeyMap {
    pub fn classify(&self, key: &InputKey, context: KeyContext) -> Decision {
        if key.same_key(&self.abort) {
            return Decision::Abort;
        }
        match context {
            KeyContext::Trial => {
                if key.same_key(&self.reject) {
                    Decision::Reject
                } else if key.same_key(&self.accept) {
                    Decision::Accept
                } else {
                    Decision::Unmapped
                }
            }
            KeyContext::YesNo => {
                if key.same_key(&self.yes) || self.yes_aliases.iter().any(|k| key.same_key(k)) {
                    Decision::Yes
                } else if key.same_key(&self.no) || self.no_aliases.iter().any(|k| key.same_key(k))
                {
                    Decision::No
                } else {
                    Decision::Unmapped
                }
            }
        }
    }

    /// Returns a key bound to two different outcomes within one context.
    pub fn find_collision(&self) -> Option<(InputKey, KeyContext)> {
        let trial = [
            (self.abort, Decision::Abort),
            (self.reject, Decision::Reject),
            (self.accept, Decision::Accept),
        ];
        if let Some(key) = first_conflict(&trial) {
            return Some((key, KeyContext::Trial));
        }
        let yes_no: Vec<_> = [
            (self.abort, Decision::Abort),
            (self.yes, Decision::Yes),
            (self.no, Decision::No),
        ]
        .into_iter()
        .chain(self.yes_aliases.iter().map(|k| (*k, Decision::Yes)))
        .chain(self.no_aliases.iter().map(|k| (*k, Decision::No)))
        .collect();
        first_conflict(&yes_no).map(|key| (key, KeyContext::YesNo))
    }
}

fn first_conflict(bindings: &[(InputKey, Decision)]) -> Option<InputKey> {
    bindings.iter().enumerate().find_map(|(i, (key, decision))| {
        bindings[i + 1..]
            .iter()
            .any(|(other, d)| key.same_key(other) && d != decision)
            .then_some(*key)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_named_key_reads_back() {
        for key in [
            InputKey::Char('j'),
            InputKey::Char(' '),
            InputKey::Escape,
            InputKey::Enter,
            InputKey::Tab,
            InputKey::BackTab,
            InputKey::Backspace,
            InputKey::Up,
            InputKey::Down,
            InputKey::Left,
            InputKey::Right,
        ] {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(serde_json::from_str::<InputKey>(&json).unwrap(), key, "{json}");
        }
    }

    #[test]
    fn unrecognized_key_is_not_written() {
        assert!(serde_json::to_string(&InputKey::Other).is_err());
        assert!(serde_json::from_str::<InputKey>("\"other\"").is_err());
    }

    #[test]
    fn trial_keys_follow_default_bindings() {
        let map = KeyMap::default();
        assert_eq!(map.classify(&InputKey::Char('j'), KeyContext::Trial), Decision::Reject);
        assert_eq!(map.classify(&InputKey::Char('F'), KeyContext::Trial), Decision::Accept);
        assert_eq!(map.classify(&InputKey::Escape, KeyContext::Trial), Decision::Abort);
        assert_eq!(map.classify(&InputKey::Char('y'), KeyContext::Trial), Decision::Unmapped);
    }

    #[test]
    fn yes_no_context_remaps_trial_keys() {
        let map = KeyMap::default();
        assert_eq!(map.classify(&InputKey::Char('y'), KeyContext::YesNo), Decision::Yes);
        assert_eq!(map.classify(&InputKey::Char('j'), KeyContext::YesNo), Decision::Yes);
        assert_eq!(map.classify(&InputKey::Char('n'), KeyContext::YesNo), Decision::No);
        assert_eq!(map.classify(&InputKey::Char('f'), KeyContext::YesNo), Decision::No);
        assert_eq!(map.classify(&InputKey::Char('q'), KeyContext::YesNo), Decision::Unmapped);
        assert_eq!(map.classify(&InputKey::Escape, KeyContext::YesNo), Decision::Abort);
    }

    #[test]
    fn key_names_parse() {
        assert_eq!(InputKey::try_from("Escape".to_string()), Ok(InputKey::Escape));
        assert_eq!(InputKey::try_from("space".to_string()), Ok(InputKey::Char(' ')));
        assert_eq!(InputKey::try_from("k".to_string()), Ok(InputKey::Char('k')));
        assert!(InputKey::try_from("kk".to_string()).is_err());
    }

    #[test]
    fn default_bindings_do_not_collide() {
        assert_eq!(KeyMap::default().find_collision(), None);
    }

    #[test]
    fn reject_equal_to_accept_collides() {
        let map = KeyMap {
            accept: InputKey::Char('j'),
            ..KeyMap::default()
        };
        assert_eq!(
            map.find_collision(),
            Some((InputKey::Char('j'), KeyContext::Trial))
        );
    }

    #[test]
    fn yes_alias_equal_to_no_collides() {
        let map = KeyMap {
            yes_aliases: vec![InputKey::Char('n')],
            ..KeyMap::default()
        };
        assert_eq!(
            map.find_collision(),
            Some((InputKey::Char('n'), KeyContext::YesNo))
        );
    }
}
