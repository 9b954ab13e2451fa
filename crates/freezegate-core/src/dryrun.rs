//! Converts a would-deny verdict into an allow-with-warnings. Modeled as a
//! pure projection over the engine's "would deny" decision so the engine's
//! core logic never has to special-case dry-run itself (§9 design note).

use freezegate_kernel::admission::Warning;

pub struct WouldDenyCondition<'a> {
    pub warning_type: &'a str,
    pub message: String,
    pub bypass_available: bool,
    pub bypass_type: Option<&'static str>,
}

pub fn shape_as_warnings(conditions: &[WouldDenyCondition<'_>]) -> Vec<Warning> {
    conditions
        .iter()
        .map(|c| Warning {
            warning_type: c.warning_type.to_string(),
            message: c.message.clone(),
            bypass_available: c.bypass_available,
            bypass_type: c.bypass_type.map(str::to_string),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_a_single_freeze_condition_into_a_warning() {
        let conditions = vec![WouldDenyCondition {
            warning_type: "FreezeActive",
            message: "Deployments are frozen".to_string(),
            bypass_available: false,
            bypass_type: None,
        }];
        let warnings = shape_as_warnings(&conditions);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].warning_type, "FreezeActive");
    }
}
