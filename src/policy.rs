//! Decorate-or-clear decision for a resolved channel.

use channel_tint_config::{ExclusionMap, HexColor, Settings};

use crate::resolver::ChannelId;

/// Target visual state of the composition surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Decorate(HexColor),
    Clear,
}

/// Why a decision came out the way it did, for logs and outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearReason {
    /// No channel could be detected.
    Unresolved,
    /// The channel matched this exclusion label.
    Excluded(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ColorPolicy;

impl ColorPolicy {
    /// Decide for `channel` given the stored exclusions and default color.
    ///
    /// A channel is excluded when it equals or contains any configured label.
    /// Two unrelated channels sharing a substring with a label are both excluded.
    pub fn decide(
        &self,
        channel: Option<&ChannelId>,
        exclusions: &ExclusionMap,
        default_color: HexColor,
    ) -> Decision {
        match self.explain(channel, exclusions) {
            Some(_) => Decision::Clear,
            None => Decision::Decorate(default_color),
        }
    }

    pub fn decide_with(&self, channel: Option<&ChannelId>, settings: &Settings) -> Decision {
        self.decide(channel, &settings.channel_colors, settings.default_color)
    }

    /// The reason `channel` must stay undecorated, or `None` if it gets the tint.
    pub fn explain(&self, channel: Option<&ChannelId>, exclusions: &ExclusionMap) -> Option<ClearReason> {
        let Some(channel) = channel else {
            return Some(ClearReason::Unresolved);
        };
        exclusions
            .matching_label(channel.as_str())
            .map(|label| ClearReason::Excluded(label.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exclusions(labels: &[&str]) -> ExclusionMap {
        labels.iter().map(|l| (*l, "#ffffff")).collect()
    }

    fn id(label: &str) -> ChannelId {
        ChannelId::new(label).unwrap()
    }

    const TINT: HexColor = HexColor::new(0xf2, 0xf2, 0xf2);

    #[test]
    fn test_unresolved_is_cleared() {
        let policy = ColorPolicy;
        assert_eq!(policy.decide(None, &ExclusionMap::new(), TINT), Decision::Clear);
        assert_eq!(
            policy.explain(None, &exclusions(&["general"])),
            Some(ClearReason::Unresolved)
        );
    }

    #[test]
    fn test_not_excluded_gets_default_color() {
        let policy = ColorPolicy;
        assert_eq!(
            policy.decide(Some(&id("C456")), &exclusions(&["general"]), TINT),
            Decision::Decorate(TINT)
        );
    }

    #[test]
    fn test_exact_and_substring_exclusion() {
        let policy = ColorPolicy;
        let map = exclusions(&["general"]);
        for label in ["general", "general-team", "team-general"] {
            assert_eq!(
                policy.decide(Some(&id(label)), &map, TINT),
                Decision::Clear,
                "{label} should be excluded"
            );
        }
        assert_eq!(
            policy.explain(Some(&id("team-general")), &map),
            Some(ClearReason::Excluded("general".to_string()))
        );
    }

    #[test]
    fn test_exclusion_color_is_ignored() {
        let policy = ColorPolicy;
        let settings = Settings::default()
            .with_default_color(HexColor::new(0, 0, 0))
            .with_exclusion("other", "#123456");
        assert_eq!(
            policy.decide_with(Some(&id("C1")), &settings),
            Decision::Decorate(HexColor::new(0, 0, 0))
        );
    }
}
