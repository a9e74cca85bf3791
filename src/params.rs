//! The tunable-parameter surface shared with external controls.
//!
//! Controls discover parameters through [`Tunable::describe`] and write them back with
//! [`Tunable::apply`]. Values are applied as given: ranges describe what a control should
//! offer, they are not enforced.

use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Float(f32),
    /// RGB with channels in `0..=255`.
    Color([f32; 3]),
    Choice(String),
    Toggle(bool),
}

impl ParamValue {
    /// A color from a control that reports channels in `0..=1`.
    pub fn from_unit_color(rgb: [f32; 3]) -> Self {
        ParamValue::Color(rgb.map(|c| c * 255.0))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Float(_) => "float",
            ParamValue::Color(_) => "color",
            ParamValue::Choice(_) => "choice",
            ParamValue::Toggle(_) => "toggle",
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{v:.3}"),
            ParamValue::Color([r, g, b]) => write!(f, "rgb({r:.0}, {g:.0}, {b:.0})"),
            ParamValue::Choice(name) => f.write_str(name),
            ParamValue::Toggle(on) => f.write_str(if *on { "on" } else { "off" }),
        }
    }
}

/// What a control should offer for a parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamRange {
    Float { min: f32, max: f32 },
    Color,
    Choice(Vec<String>),
    Toggle,
}

/// One entry of a parameter listing.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub value: ParamValue,
    pub range: ParamRange,
}

impl ParamSpec {
    pub fn float(name: &'static str, value: f32, min: f32, max: f32) -> Self {
        Self {
            name,
            value: ParamValue::Float(value),
            range: ParamRange::Float { min, max },
        }
    }

    pub fn color(name: &'static str, value: [f32; 3]) -> Self {
        Self {
            name,
            value: ParamValue::Color(value),
            range: ParamRange::Color,
        }
    }

    pub fn choice(name: &'static str, value: &str, options: &[&str]) -> Self {
        Self {
            name,
            value: ParamValue::Choice(value.to_string()),
            range: ParamRange::Choice(options.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn toggle(name: &'static str, value: bool) -> Self {
        Self {
            name,
            value: ParamValue::Toggle(value),
            range: ParamRange::Toggle,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("unknown parameter '{0}'")]
    Unknown(String),
    #[error("parameter '{name}' takes a {expected} value, got a {got} value")]
    WrongKind {
        name: String,
        expected: &'static str,
        got: &'static str,
    },
}

/// A record of named parameters.
pub trait Tunable {
    fn describe(&self) -> Vec<ParamSpec>;

    fn apply(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError>;

    /// The current value of one parameter.
    fn get(&self, name: &str) -> Option<ParamValue> {
        self.describe()
            .into_iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.value)
    }
}

/// Write `value` into a float field, rejecting other kinds.
pub fn set_float(slot: &mut f32, name: &str, value: ParamValue) -> Result<(), ParamError> {
    match value {
        ParamValue::Float(v) => {
            *slot = v;
            Ok(())
        }
        other => Err(wrong_kind(name, "float", &other)),
    }
}

pub fn set_color(slot: &mut [f32; 3], name: &str, value: ParamValue) -> Result<(), ParamError> {
    match value {
        ParamValue::Color(v) => {
            *slot = v;
            Ok(())
        }
        other => Err(wrong_kind(name, "color", &other)),
    }
}

pub fn set_toggle(slot: &mut bool, name: &str, value: ParamValue) -> Result<(), ParamError> {
    match value {
        ParamValue::Toggle(v) => {
            *slot = v;
            Ok(())
        }
        other => Err(wrong_kind(name, "toggle", &other)),
    }
}

pub fn set_choice(slot: &mut String, name: &str, value: ParamValue) -> Result<(), ParamError> {
    match value {
        ParamValue::Choice(v) => {
            *slot = v;
            Ok(())
        }
        other => Err(wrong_kind(name, "choice", &other)),
    }
}

fn wrong_kind(name: &str, expected: &'static str, got: &ParamValue) -> ParamError {
    ParamError::WrongKind {
        name: name.to_string(),
        expected,
        got: got.kind(),
    }
}

/// A parameter that was just applied.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamChange {
    pub name: String,
    pub value: ParamValue,
}

pub type ParamListener = Box<dyn FnMut(&ParamChange)>;

/// Callbacks fired after each successful parameter write.
#[derive(Default)]
pub struct ParamListeners {
    listeners: Vec<ParamListener>,
}

impl ParamListeners {
    pub fn add(&mut self, listener: impl FnMut(&ParamChange) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn notify(&mut self, change: &ParamChange) {
        for listener in &mut self.listeners {
            listener(change);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn unit_colors_rescale_to_bytes() {
        assert_eq!(
            ParamValue::from_unit_color([1.0, 0.5, 0.0]),
            ParamValue::Color([255.0, 127.5, 0.0])
        );
    }

    #[test]
    fn setters_reject_other_kinds() {
        let mut scale = 0.5;
        assert_eq!(
            set_float(&mut scale, "scale", ParamValue::Toggle(true)),
            Err(ParamError::WrongKind {
                name: "scale".into(),
                expected: "float",
                got: "toggle",
            })
        );
        assert_eq!(scale, 0.5);

        set_float(&mut scale, "scale", ParamValue::Float(12.0)).unwrap();
        assert_eq!(scale, 12.0);
    }

    #[test]
    fn listeners_see_every_change() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = ParamListeners::default();
        listeners.add({
            let seen = seen.clone();
            move |change| seen.borrow_mut().push(change.name.clone())
        });

        for name in ["scale", "angle"] {
            listeners.notify(&ParamChange {
                name: name.to_string(),
                value: ParamValue::Float(1.0),
            });
        }
        assert_eq!(*seen.borrow(), ["scale", "angle"]);
    }

    #[test]
    fn values_display_for_controls() {
        assert_eq!(ParamValue::Float(0.72).to_string(), "0.720");
        assert_eq!(ParamValue::Color([68.0, 107.0, 147.0]).to_string(), "rgb(68, 107, 147)");
        assert_eq!(ParamValue::Toggle(false).to_string(), "off");
    }
}
