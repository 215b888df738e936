pub mod actor;
pub mod competition;
pub mod engagement;
pub mod participant;
pub mod payment;
pub mod performance;
pub mod setting;

pub use actor::{Actor, ActorRole};
pub use competition::{
    Competition, CompetitionStatus, JudgingCriterion, Prize, RegistrationStatus,
};
pub use engagement::{ChatMessage, Reaction, ReactionCount, Vote, VoteTally};
pub use participant::{EntryPaymentStatus, Participant, ParticipantStatus};
pub use payment::{CommissionSplit, Payment, PaymentStatus, REFUND_WINDOW_DAYS, round_money};
pub use performance::{Performance, PerformanceStatus};
pub use setting::{COMPETITION_COMMISSION_RATE, PlatformSetting};
