pub mod activity_queue;
pub mod holding;
pub mod leaderboard;
pub mod participant;
pub mod price_history;
pub mod valuation;

/// A participant's identity: the (guild, platform user) pair.
///
/// Globally unique per guild; the same platform user in two guilds is two
/// independent participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    pub guild_id: i64,
    pub user_id: i64,
}

impl Identity {
    pub fn new(guild_id: i64, user_id: i64) -> Self {
        Self { guild_id, user_id }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.guild_id, self.user_id)
    }
}

/// Time-boxed status modifier kinds.
///
/// This is the sqlx::Type version bound to the `modifier_kind` database
/// enum. The item-effect catalogue that grants these is an external
/// collaborator; only the numeric consequences live here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "modifier_kind")]
pub enum ModifierKind {
    /// Doubles the participant's scored points for a batch.
    AmplifiedScoring,
    /// Overrides volatility to the configured ceiling.
    AmplifiedVolatility,
    /// Protects the valuation from the decay sweep.
    GrowthFreeze,
    /// Applies the growth penalty multiplier to positive deltas.
    SuppressedGrowth,
}
