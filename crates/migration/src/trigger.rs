// SPDX-FileCopyrightText: Copyright (C) 2018-2025 Uwe Klotz <uwedotklotzatgmaildotcom> et al.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Trigger-name grammar (spec.md §4.7 "Introspection"): a trigger's purpose
//! is encoded entirely in its name, `ST_TRIGGER:<timing>:<event>:<source>@
//! <source-field>:<target>@<target-field>:<policy>`, so the planner can
//! recognise and recreate a trigger it authored without parsing the trigger
//! body back out of the live DDL. This is, by spec design, brittle to
//! anyone hand-editing a trigger's name; see DESIGN.md.

use smol_str::SmolStr;

use crate::shape::{TriggerEvent, TriggerTiming};

const PREFIX: &str = "ST_TRIGGER";

/// The parsed form of a migration-authored trigger name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriggerName {
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
    pub source: SmolStr,
    pub source_field: Option<SmolStr>,
    pub target: SmolStr,
    pub target_field: Option<SmolStr>,
    pub policy: SmolStr,
}

fn split_at_sign(part: &str) -> (SmolStr, Option<SmolStr>) {
    part.split_once('@')
        .map_or_else(|| (SmolStr::new(part), None), |(a, b)| (SmolStr::new(a), Some(SmolStr::new(b))))
}

impl TriggerName {
    #[must_use]
    pub fn render(&self) -> String {
        let timing = match self.timing {
            TriggerTiming::Before => "BEFORE",
            TriggerTiming::After => "AFTER",
        };
        let event = match self.event {
            TriggerEvent::Insert => "INSERT",
            TriggerEvent::Update => "UPDATE",
            TriggerEvent::Delete => "DELETE",
        };
        let source = self
            .source_field
            .as_ref()
            .map_or_else(|| self.source.to_string(), |f| format!("{}@{f}", self.source));
        let target = self
            .target_field
            .as_ref()
            .map_or_else(|| self.target.to_string(), |f| format!("{}@{f}", self.target));
        format!("{PREFIX}:{timing}:{event}:{source}:{target}:{}", self.policy)
    }

    /// Parse a trigger name back into its structured form. Triggers whose
    /// name does not start with the reserved prefix are "left alone"
    /// (spec.md §4.7) — callers should treat `None` as "not ours".
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(PREFIX)?.strip_prefix(':')?;
        let mut parts = rest.splitn(5, ':');
        let timing = match parts.next()? {
            "BEFORE" => TriggerTiming::Before,
            "AFTER" => TriggerTiming::After,
            _ => return None,
        };
        let event = match parts.next()? {
            "INSERT" => TriggerEvent::Insert,
            "UPDATE" => TriggerEvent::Update,
            "DELETE" => TriggerEvent::Delete,
            _ => return None,
        };
        let (source, source_field) = split_at_sign(parts.next()?);
        let (target, target_field) = split_at_sign(parts.next()?);
        let policy = SmolStr::new(parts.next()?);
        Some(Self {
            timing,
            event,
            source,
            source_field,
            target,
            target_field,
            policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_render_and_parse() {
        let name = TriggerName {
            timing: TriggerTiming::Before,
            event: TriggerEvent::Delete,
            source: "post".into(),
            source_field: Some("owner".into()),
            target: "user".into(),
            target_field: None,
            policy: "set_null".into(),
        };
        let rendered = name.render();
        assert_eq!(rendered, "ST_TRIGGER:BEFORE:DELETE:post@owner:user:set_null");
        assert_eq!(TriggerName::parse(&rendered), Some(name));
    }

    #[test]
    fn unrecognised_name_is_left_alone() {
        assert!(TriggerName::parse("some_legacy_trigger").is_none());
        assert!(TriggerName::parse("sqlite_autoindex_post_1").is_none());
    }
}
