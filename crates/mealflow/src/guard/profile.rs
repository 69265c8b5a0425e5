//! Per-request-type capability table.
//!
//! Request types never subclass anything: each one maps to a variant and a
//! profile of guard parameters, and the shared engine does the rest.

use serde::{Deserialize, Serialize};
use time::Date;

use super::Guard;
use super::calendar::Calendar;
use crate::config::EngineConfig;
use crate::definition::WorkflowVariant;

/// Concrete request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    MenuChange,
    MenuChangeCei,
    MenuChangeCemei,
    /// Menu change to an emergency snack. Exempt from notice windows.
    EmergencySnack,
    MenuInversion,
    FoodInclusion,
    ContinuousFoodInclusion,
    FoodInclusionCei,
    FoodInclusionCemei,
    TourKit,
    TourKitCei,
    FoodSuspension,
    FoodSuspensionCei,
    SpecialDiet,
    InitialMeasurement,
}

/// Guard parameters and workflow family of a request type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestProfile {
    pub variant: WorkflowVariant,
    /// Skips advance-notice and cancellation-window checks.
    pub notice_exempt: bool,
    /// Dates in vacation months skip the school-day check.
    pub vacation_override: bool,
    requires_notice: bool,
    checks_school_day: bool,
    dated: bool,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::MenuChange => "menu_change",
            RequestType::MenuChangeCei => "menu_change_cei",
            RequestType::MenuChangeCemei => "menu_change_cemei",
            RequestType::EmergencySnack => "emergency_snack",
            RequestType::MenuInversion => "menu_inversion",
            RequestType::FoodInclusion => "food_inclusion",
            RequestType::ContinuousFoodInclusion => "continuous_food_inclusion",
            RequestType::FoodInclusionCei => "food_inclusion_cei",
            RequestType::FoodInclusionCemei => "food_inclusion_cemei",
            RequestType::TourKit => "tour_kit",
            RequestType::TourKitCei => "tour_kit_cei",
            RequestType::FoodSuspension => "food_suspension",
            RequestType::FoodSuspensionCei => "food_suspension_cei",
            RequestType::SpecialDiet => "special_diet",
            RequestType::InitialMeasurement => "initial_measurement",
        }
    }

    pub fn variant(&self) -> WorkflowVariant {
        self.profile().variant
    }

    pub fn profile(&self) -> RequestProfile {
        use RequestType::*;

        let approval = RequestProfile {
            variant: WorkflowVariant::ApprovalFromSchool,
            notice_exempt: false,
            vacation_override: false,
            requires_notice: true,
            checks_school_day: true,
            dated: true,
        };

        match self {
            MenuChange | MenuChangeCei | MenuChangeCemei | MenuInversion => approval,
            EmergencySnack => RequestProfile {
                notice_exempt: true,
                ..approval
            },
            FoodInclusion | ContinuousFoodInclusion | FoodInclusionCei | FoodInclusionCemei
            | TourKit | TourKitCei => RequestProfile {
                vacation_override: true,
                ..approval
            },
            FoodSuspension | FoodSuspensionCei => RequestProfile {
                variant: WorkflowVariant::InformationalFromSchool,
                requires_notice: false,
                ..approval
            },
            SpecialDiet => RequestProfile {
                variant: WorkflowVariant::SpecialDietFromSchool,
                notice_exempt: true,
                vacation_override: false,
                requires_notice: false,
                checks_school_day: false,
                dated: false,
            },
            InitialMeasurement => RequestProfile {
                variant: WorkflowVariant::InitialMeasurement,
                notice_exempt: true,
                vacation_override: false,
                requires_notice: false,
                checks_school_day: false,
                dated: false,
            },
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RequestProfile {
    /// Ordered guards run when a request of this type is created and again
    /// when it is submitted. The first failure wins.
    pub fn creation_guards(&self, config: &EngineConfig) -> Vec<Guard> {
        if !self.dated {
            return Vec::new();
        }

        let mut guards = vec![Guard::NotInPast];
        if self.requires_notice {
            guards.push(Guard::MustRequestDaysInAdvance(
                config.advance_notice_business_days,
            ));
        }
        guards.push(Guard::MustBeSameFiscalYear);
        guards.push(Guard::NoDuplicateActiveRequest);
        if self.checks_school_day {
            guards.push(Guard::MustBeASchoolDay {
                vacation_override: self.vacation_override,
            });
        }
        guards
    }
}

/// How close to its first date a request was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Within the priority band (default: 2 business days).
    Priority,
    /// Within the limit band (default: 3 to 5 business days).
    Limit,
    Regular,
    /// First date already passed.
    Expired,
}

impl Priority {
    /// Classify a request submitted on `today` whose first date is `first`.
    ///
    /// A first date on a weekend or holiday counts from the business day
    /// before it.
    pub fn classify(
        today: Date,
        first: Date,
        calendar: &dyn Calendar,
        config: &EngineConfig,
    ) -> Priority {
        let effective = calendar.business_day_on_or_before(first);
        if effective < today {
            return Priority::Expired;
        }
        if effective <= calendar.add_business_days(today, config.priority_business_days) {
            return Priority::Priority;
        }
        if first <= calendar.add_business_days(today, config.limit_business_days) {
            return Priority::Limit;
        }
        Priority::Regular
    }

    /// Priority and limit requests count as submitted late.
    pub fn is_late(&self) -> bool {
        matches!(self, Priority::Priority | Priority::Limit)
    }
}
