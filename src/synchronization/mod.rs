mod clock;

pub use clock::EpochClock;
