use candid::{CandidType, Deserialize};
use serde::Serialize;

use crate::ledger::stake::Stake;
use crate::types::format_hearts;

/// One all-day reminder on a stake's unlock date
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct CalendarEvent {
    pub uid: String,
    /// ISO date (YYYY-MM-DD)
    pub date: String,
    pub all_day: bool,
    pub summary: String,
    pub description: String,
}

/// Events for every stake with a representable unlock date, earliest first
pub fn calendar_events(stakes: &[Stake]) -> Vec<CalendarEvent> {
    let mut dated: Vec<_> = stakes
        .iter()
        .filter_map(|stake| stake.unlock_date().map(|date| (date, stake)))
        .collect();
    dated.sort_by(|(a_date, a), (b_date, b)| {
        (a_date, a.stake_id, a.owner).cmp(&(b_date, b.stake_id, b.owner))
    });

    dated
        .into_iter()
        .map(|(date, stake)| CalendarEvent {
            uid: format!("stake-{}", stake.stake_id),
            date: date.to_string(),
            all_day: true,
            summary: format!("HEX unlock day for #{}", stake.stake_id),
            description: format!(
                "Stake #{} of {} HEX unlocks today.\n\nStaked from account {}.",
                stake.stake_id,
                format_hearts(&stake.staked_hearts),
                stake.owner
            ),
        })
        .collect()
}
