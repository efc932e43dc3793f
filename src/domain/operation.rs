//! Trading instructions emitted by strategies.

use std::collections::BTreeMap;

use super::signal::SignalType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpAction {
    Open,
    Close,
}

/// An instruction returned by a strategy, consumed immediately by the
/// position manager and discarded. The `info` map is strategy-private:
/// the core copies it onto the position but never interprets it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub action: OpAction,
    pub signal: SignalType,
    pub stop_loss: Option<f64>,
    pub info: BTreeMap<String, String>,
    pub msg: String,
}

impl Operation {
    pub fn open(signal: SignalType, stop_loss: Option<f64>, msg: impl Into<String>) -> Self {
        Operation {
            action: OpAction::Open,
            signal,
            stop_loss,
            info: BTreeMap::new(),
            msg: msg.into(),
        }
    }

    pub fn close(signal: SignalType, msg: impl Into<String>) -> Self {
        Operation {
            action: OpAction::Close,
            signal,
            stop_loss: None,
            info: BTreeMap::new(),
            msg: msg.into(),
        }
    }

    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = match self.action {
            OpAction::Open => "open",
            OpAction::Close => "close",
        };
        write!(
            f,
            "signal {} action {} stop_loss {:?} msg: {}",
            self.signal, action, self.stop_loss, self.msg
        )
    }
}
