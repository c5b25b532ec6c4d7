// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Acne severity buckets derived from the detection count

use serde::{Serialize, Serializer};
use std::fmt;

/// Ordinal severity bucket
///
/// Serialized with the labels clients already consume ("Rendah", "Sedang",
/// "Parah", "Sangat Parah").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeverityLabel {
    Low,
    Moderate,
    Severe,
    VerySevere,
}

impl SeverityLabel {
    /// Inclusive upper bounds of Low, Moderate and Severe
    const LOW_MAX: usize = 5;
    const MODERATE_MAX: usize = 15;
    const SEVERE_MAX: usize = 30;

    /// Bucket a detection count
    pub fn from_count(count: usize) -> Self {
        if count <= Self::LOW_MAX {
            SeverityLabel::Low
        } else if count <= Self::MODERATE_MAX {
            SeverityLabel::Moderate
        } else if count <= Self::SEVERE_MAX {
            SeverityLabel::Severe
        } else {
            SeverityLabel::VerySevere
        }
    }

    /// Wire label
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLabel::Low => "Rendah",
            SeverityLabel::Moderate => "Sedang",
            SeverityLabel::Severe => "Parah",
            SeverityLabel::VerySevere => "Sangat Parah",
        }
    }
}

/// Shorthand for [`SeverityLabel::from_count`]
pub fn severity(count: usize) -> SeverityLabel {
    SeverityLabel::from_count(count)
}

impl fmt::Display for SeverityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SeverityLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
