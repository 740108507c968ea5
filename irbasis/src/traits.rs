//! Particle statistics, at run time and at the type level

/// Statistics of the propagator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistics {
    Fermionic,
    Bosonic,
}

impl Statistics {
    pub fn is_fermionic(self) -> bool {
        matches!(self, Statistics::Fermionic)
    }

    pub fn is_bosonic(self) -> bool {
        matches!(self, Statistics::Bosonic)
    }

    /// Offset ζ of the reduced Matsubara index: n = 2m + ζ
    pub fn zeta(self) -> i64 {
        match self {
            Statistics::Fermionic => 1,
            Statistics::Bosonic => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Statistics::Fermionic => "fermionic",
            Statistics::Bosonic => "bosonic",
        }
    }
}

/// Compile-time statistics tag carried by bases and samplers
pub trait StatisticsType: Copy + Send + Sync + 'static {
    const STATISTICS: Statistics;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fermionic;

impl StatisticsType for Fermionic {
    const STATISTICS: Statistics = Statistics::Fermionic;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bosonic;

impl StatisticsType for Bosonic {
    const STATISTICS: Statistics = Statistics::Bosonic;
}
