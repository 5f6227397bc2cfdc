//! The event shape delivered to a running [`crate::actor::Actor`].
//!
//! An event is a name plus an arbitrary JSON payload rather than a
//! generic-per-machine type: the configuration schema (C11) is itself
//! data-driven, so the event type that flows through it is too. Actions,
//! guards, and delay functions all receive `(&mut Context, &Event)` /
//! `(&Context, &Event)`.

use std::fmt;

/// An event name reserved for the interpreter itself: timer expiry, done/
/// error notifications from invoked children (§4.7, §4.2 GLOSSARY).
pub const ALWAYS: &str = "";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Event {
        Event {
            name: name.into(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(name: impl Into<String>, data: serde_json::Value) -> Event {
        Event {
            name: name.into(),
            data,
        }
    }

    pub fn done_invoke(id: &str, output: serde_json::Value) -> Event {
        Event::with_data(format!("done.invoke.{id}"), output)
    }

    pub fn error_invoke(id: &str, message: &str) -> Event {
        Event::with_data(
            format!("error.invoke.{id}"),
            serde_json::json!({ "message": message }),
        )
    }

    pub fn is_done_invoke(&self) -> bool {
        self.name.starts_with("done.invoke.")
    }

    pub fn is_error_invoke(&self) -> bool {
        self.name.starts_with("error.invoke.")
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Event {
        Event::new(name)
    }
}

impl From<String> for Event {
    fn from(name: String) -> Event {
        Event::new(name)
    }
}
