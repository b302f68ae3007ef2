use super::*;
use crate::extractor::{extract_references, AttributeRead, FunctionReferences};
use chrono::{DateTime, Datelike, Utc, Weekday};

/// Document or link event a rule can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleEvent {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTiming {
    Create,
    Update,
    Delete,
    CreateUpdate,
    CreateDelete,
    UpdateDelete,
    All,
}

impl RuleTiming {
    pub fn fires_on(&self, event: RuleEvent) -> bool {
        use RuleTiming::*;

        match event {
            RuleEvent::Create => matches!(self, Create | CreateUpdate | CreateDelete | All),
            RuleEvent::Update => matches!(self, Update | CreateUpdate | UpdateDelete | All),
            RuleEvent::Delete => matches!(self, Delete | CreateDelete | UpdateDelete | All),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklySource {
    pub xml: String,
    pub js: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklyRule {
    #[serde(flatten)]
    pub source: BlocklySource,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CronUnit {
    Days,
    Weeks,
    Months,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronRule {
    pub blockly: BlocklySource,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// hour of the day the rule runs at
    pub hour: u8,
    pub interval: u32,
    pub unit: CronUnit,
    /// Monday is the least significant bit
    #[serde(default)]
    pub days_of_week: u8,
    pub occurrence: Option<u32>,
    pub language: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
}

impl CronRule {
    pub fn runs_on(&self, day: Weekday) -> bool {
        self.days_of_week & (1 << day.num_days_from_monday()) != 0
    }

    fn validate(&self) -> CascadeResult<()> {
        if self.interval < 1 {
            return Err(CascadeError::InvalidRule("cron interval must be at least 1".into()));
        }
        if self.hour > 23 {
            return Err(CascadeError::InvalidRule(format!(
                "cron hour {} is out of range",
                self.hour
            )));
        }
        if self.days_of_week > 0b111_1111 {
            return Err(CascadeError::InvalidRule(
                "cron days of week has bits past sunday".into(),
            ));
        }
        if self.unit == CronUnit::Weeks && self.days_of_week == 0 {
            return Err(CascadeError::InvalidRule(
                "weekly cron rule needs at least one day".into(),
            ));
        }
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since > until {
                return Err(CascadeError::InvalidRule("cron since is after until".into()));
            }
        }
        Ok(())
    }

    /// Whether `now` lies inside the rule's active window.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.since.map_or(true, |since| since <= now)
            && self.until.map_or(true, |until| now <= until)
            && (self.unit != CronUnit::Weeks || self.runs_on(now.weekday()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZapierRule {
    pub hook_url: String,
    #[serde(default)]
    pub update_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoLinkRule {
    pub link_type_id: String,
    pub collection1: String,
    pub attribute1: String,
    pub collection2: String,
    pub attribute2: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    Blockly(BlocklyRule),
    Cron(CronRule),
    Zapier(ZapierRule),
    AutoLink(AutoLinkRule),
    Wizard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub timing: RuleTiming,
    pub kind: RuleKind,
}

impl Rule {
    fn build(name: String, timing: RuleTiming, kind: RuleKind) -> CascadeResult<Self> {
        let rule = Self { name, timing, kind };
        rule.validate()?;
        Ok(rule)
    }

    pub fn blockly<S: Into<String>>(
        name: S,
        timing: RuleTiming,
        source: BlocklySource,
        dry_run: bool,
    ) -> CascadeResult<Self> {
        Self::build(
            name.into(),
            timing,
            RuleKind::Blockly(BlocklyRule { source, dry_run }),
        )
    }

    pub fn cron<S: Into<String>>(name: S, cron: CronRule) -> CascadeResult<Self> {
        Self::build(name.into(), RuleTiming::All, RuleKind::Cron(cron))
    }

    pub fn zapier<S: Into<String>, U: Into<String>>(
        name: S,
        timing: RuleTiming,
        hook_url: U,
        update_only: bool,
    ) -> CascadeResult<Self> {
        Self::build(
            name.into(),
            timing,
            RuleKind::Zapier(ZapierRule {
                hook_url: hook_url.into(),
                update_only,
            }),
        )
    }

    pub fn auto_link<S: Into<String>>(name: S, auto_link: AutoLinkRule) -> CascadeResult<Self> {
        Self::build(name.into(), RuleTiming::All, RuleKind::AutoLink(auto_link))
    }

    pub fn wizard<S: Into<String>>(name: S, timing: RuleTiming) -> CascadeResult<Self> {
        Self::build(name.into(), timing, RuleKind::Wizard)
    }

    pub fn validate(&self) -> CascadeResult<()> {
        if self.name.trim().is_empty() {
            return Err(CascadeError::InvalidRule("rule name is empty".into()));
        }
        match &self.kind {
            RuleKind::Blockly(_) | RuleKind::Wizard => Ok(()),
            RuleKind::Cron(cron) => cron.validate(),
            RuleKind::Zapier(zapier) => {
                let rest = zapier
                    .hook_url
                    .strip_prefix("https://")
                    .or_else(|| zapier.hook_url.strip_prefix("http://"));
                match rest {
                    Some(host) if !host.is_empty() => Ok(()),
                    _ => Err(CascadeError::InvalidRule(format!(
                        "zapier hook `{}` is not an http url",
                        zapier.hook_url
                    ))),
                }
            }
            RuleKind::AutoLink(link) => {
                let ids = [
                    &link.link_type_id,
                    &link.collection1,
                    &link.attribute1,
                    &link.collection2,
                    &link.attribute2,
                ];
                if ids.iter().any(|id| id.is_empty()) {
                    return Err(CascadeError::InvalidRule(
                        "auto link rule has an empty identifier".into(),
                    ));
                }
                if link.collection1 == link.collection2 && link.attribute1 == link.attribute2 {
                    return Err(CascadeError::InvalidRule(
                        "auto link rule joins an attribute with itself".into(),
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn from_json(json: &str) -> CascadeResult<Self> {
        let rule: Self = serde_json::from_str(json)?;
        rule.validate()?;
        Ok(rule)
    }

    /// Resources and attributes the rule touches.
    pub fn references(&self, known: &KnownResources) -> FunctionReferences {
        match &self.kind {
            RuleKind::Blockly(BlocklyRule { source, .. })
            | RuleKind::Cron(CronRule {
                blockly: source, ..
            }) => extract_references(&source.xml, &source.js, known),
            RuleKind::AutoLink(link) => {
                let mut references = FunctionReferences::default();
                references.add_resource(ResourceReference::link(&link.link_type_id));
                references.add_resource(ResourceReference::collection(&link.collection1));
                references.add_resource(ResourceReference::collection(&link.collection2));
                references.attributes.insert(AttributeRead::new(AttributeRef::collection(
                    &link.collection1,
                    &link.attribute1,
                )));
                references.attributes.insert(AttributeRead::new(AttributeRef::collection(
                    &link.collection2,
                    &link.attribute2,
                )));
                references
            }
            RuleKind::Zapier(_) | RuleKind::Wizard => FunctionReferences::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cron() -> CronRule {
        CronRule {
            blockly: BlocklySource::default(),
            since: None,
            until: None,
            hour: 8,
            interval: 1,
            unit: CronUnit::Weeks,
            days_of_week: 0b000_0101,
            occurrence: None,
            language: Some("en".into()),
            last_run: None,
        }
    }

    #[test]
    fn timing_matches_events() {
        assert!(RuleTiming::CreateUpdate.fires_on(RuleEvent::Create));
        assert!(RuleTiming::CreateUpdate.fires_on(RuleEvent::Update));
        assert!(!RuleTiming::CreateUpdate.fires_on(RuleEvent::Delete));
        assert!(RuleTiming::Delete.fires_on(RuleEvent::Delete));
        assert!(!RuleTiming::Delete.fires_on(RuleEvent::Update));
        assert!(RuleTiming::All.fires_on(RuleEvent::Delete));
    }

    #[test]
    fn cron_validation() {
        assert!(Rule::cron("daily", cron()).is_ok());
        assert!(Rule::cron("bad", CronRule { interval: 0, ..cron() }).is_err());
        assert!(Rule::cron("bad", CronRule { hour: 24, ..cron() }).is_err());
        assert!(Rule::cron("bad", CronRule { days_of_week: 0, ..cron() }).is_err());
        assert!(Rule::cron(
            "days",
            CronRule {
                days_of_week: 0,
                unit: CronUnit::Days,
                ..cron()
            }
        )
        .is_ok());

        let since = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        assert!(Rule::cron(
            "window",
            CronRule {
                since: Some(since),
                until: Some(until),
                ..cron()
            }
        )
        .is_err());
    }

    #[test]
    fn cron_days_of_week() {
        let rule = cron();
        assert!(rule.runs_on(Weekday::Mon));
        assert!(!rule.runs_on(Weekday::Tue));
        assert!(rule.runs_on(Weekday::Wed));
        assert!(!rule.runs_on(Weekday::Sun));

        // 2024-05-01 is a wednesday
        let wednesday = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        assert!(rule.is_active(wednesday));
        assert!(!rule.is_active(wednesday + chrono::Duration::days(1)));
        assert!(!CronRule {
            since: Some(wednesday + chrono::Duration::days(7)),
            ..cron()
        }
        .is_active(wednesday));
    }

    #[test]
    fn zapier_and_auto_link_validation() {
        assert!(Rule::zapier("z", RuleTiming::All, "https://hooks.zapier.com/x", false).is_ok());
        assert!(Rule::zapier("z", RuleTiming::All, "ftp://hooks", false).is_err());
        assert!(Rule::zapier("z", RuleTiming::All, "https://", false).is_err());

        let link = AutoLinkRule {
            link_type_id: "l1".into(),
            collection1: "c1".into(),
            attribute1: "a1".into(),
            collection2: "c2".into(),
            attribute2: "a1".into(),
        };
        assert!(Rule::auto_link("link", link.clone()).is_ok());
        assert!(Rule::auto_link(
            "link",
            AutoLinkRule {
                collection2: "c1".into(),
                ..link.clone()
            }
        )
        .is_err());
        assert!(Rule::auto_link(
            "link",
            AutoLinkRule {
                link_type_id: String::new(),
                ..link
            }
        )
        .is_err());
        assert!(Rule::wizard(" ", RuleTiming::Create).is_err());
    }

    #[test]
    fn rule_json_is_tagged() {
        let rule = Rule::zapier("zap", RuleTiming::Update, "https://hooks/1", true).unwrap();
        let json = serde_json::to_value(&rule).unwrap();
        assert_json_diff::assert_json_eq!(
            json,
            serde_json::json!({
                "name": "zap",
                "timing": "update",
                "kind": { "type": "zapier", "hook_url": "https://hooks/1", "update_only": true }
            })
        );
        assert_eq!(Rule::from_json(&json.to_string()).unwrap(), rule);

        let invalid = r#"{"name":"z","timing":"all","kind":{"type":"zapier","hook_url":"nope"}}"#;
        assert!(matches!(Rule::from_json(invalid), Err(CascadeError::InvalidRule(_))));

        let blockly = r#"{"name":"b","timing":"create","kind":{"type":"blockly","xml":"<xml/>","js":""}}"#;
        let rule = Rule::from_json(blockly).unwrap();
        assert!(matches!(rule.kind, RuleKind::Blockly(BlocklyRule { dry_run: false, .. })));
    }

    #[test]
    fn auto_link_references_are_fixed() {
        let rule = Rule::auto_link(
            "link",
            AutoLinkRule {
                link_type_id: "l1".into(),
                collection1: "c1".into(),
                attribute1: "a1".into(),
                collection2: "c2".into(),
                attribute2: "a2".into(),
            },
        )
        .unwrap();

        let references = rule.references(&KnownResources::default());
        assert_eq!(references.resources.len(), 3);
        assert!(references.resources.contains(&ResourceReference::link("l1")));
        assert!(references
            .attributes
            .contains(&AttributeRead::new(AttributeRef::collection("c2", "a2"))));
    }
}
