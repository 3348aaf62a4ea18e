use super::super::features::EngineeredFeatures;
use super::{RuleFactor, ScoreComponent};

/// Points applied when debt-to-income could not be computed.
const UNKNOWN_DTI_POINTS: f64 = -25.0;

fn push(components: &mut Vec<ScoreComponent>, factor: RuleFactor, points: f64, notes: String) {
    components.push(ScoreComponent {
        factor,
        points,
        notes,
    });
}

fn dti_known(features: &EngineeredFeatures) -> bool {
    !features.guards.iter().any(|guard| guard.field == "dti_ratio")
}

fn ltv_known(features: &EngineeredFeatures) -> bool {
    !features.guards.iter().any(|guard| guard.field == "ltv_ratio")
}

pub(crate) fn approval_points(features: &EngineeredFeatures) -> (Vec<ScoreComponent>, f64) {
    let mut components = Vec::new();

    let score = features.credit_score;
    let credit = if score >= 780.0 {
        20.0
    } else if score >= 740.0 {
        15.0
    } else if score >= 700.0 {
        10.0
    } else if score >= 650.0 {
        3.0
    } else if score >= 600.0 {
        -10.0
    } else if score >= 550.0 {
        -18.0
    } else {
        -25.0
    };
    push(
        &mut components,
        RuleFactor::CreditScore,
        credit,
        format!("credit score {score:.0}"),
    );

    if dti_known(features) {
        let dti = features.dti_ratio;
        let points = if dti <= 0.28 {
            10.0
        } else if dti <= 0.36 {
            3.0
        } else if dti <= 0.43 {
            -5.0
        } else if dti <= 0.50 {
            -15.0
        } else {
            -25.0
        };
        push(
            &mut components,
            RuleFactor::DebtToIncome,
            points,
            format!("debt-to-income {dti:.2}"),
        );
    } else {
        push(
            &mut components,
            RuleFactor::DebtToIncome,
            UNKNOWN_DTI_POINTS,
            "debt-to-income unavailable without positive income".to_string(),
        );
    }

    let income = features.monthly_income;
    let income_points = if income >= 80_000.0 {
        8.0
    } else if income >= 50_000.0 {
        4.0
    } else if income >= 35_000.0 {
        1.0
    } else if income < 25_000.0 {
        -10.0
    } else {
        0.0
    };
    if income_points != 0.0 {
        push(
            &mut components,
            RuleFactor::Income,
            income_points,
            format!("monthly income {income:.0}"),
        );
    }

    if let Some(months) = features.employment_duration_months {
        let points = if months >= 36.0 {
            5.0
        } else if months >= 24.0 {
            2.0
        } else if months < 6.0 {
            -15.0
        } else if months < 12.0 {
            -8.0
        } else {
            0.0
        };
        if points != 0.0 {
            push(
                &mut components,
                RuleFactor::EmploymentStability,
                points,
                format!("{months:.0} months in current employment"),
            );
        }
    }

    if ltv_known(features) {
        let ltv = features.ltv_ratio;
        let points = if ltv <= 0.70 {
            4.0
        } else if ltv <= 0.80 {
            1.0
        } else if ltv <= 0.90 {
            -3.0
        } else if ltv > 0.95 {
            -12.0
        } else {
            -6.0
        };
        push(
            &mut components,
            RuleFactor::LoanToValue,
            points,
            format!("loan-to-value {:.0}%", ltv * 100.0),
        );
    }

    if features.long_processing {
        push(
            &mut components,
            RuleFactor::ProcessingDelay,
            -5.0,
            "application in process beyond 30 days".to_string(),
        );
    }

    if features.low_documentation {
        push(
            &mut components,
            RuleFactor::Documentation,
            -8.0,
            "fewer than 3 documents submitted".to_string(),
        );
    }

    if let Some(age) = features.age {
        let points = if (30.0..=50.0).contains(&age) {
            2.0
        } else if age < 25.0 {
            -3.0
        } else if age > 65.0 {
            -5.0
        } else {
            0.0
        };
        if points != 0.0 {
            push(
                &mut components,
                RuleFactor::Age,
                points,
                format!("applicant age {age:.0}"),
            );
        }
    }

    let total = components.iter().map(|component| component.points).sum();
    (components, total)
}

pub(crate) fn withdrawal_points(features: &EngineeredFeatures) -> (Vec<ScoreComponent>, f64) {
    let mut components = Vec::new();

    if let Some(days) = features.days_in_process {
        let points = if days > 45.0 {
            25.0
        } else if days > 30.0 {
            15.0
        } else if days > 20.0 {
            8.0
        } else if days < 10.0 {
            -5.0
        } else {
            0.0
        };
        if points != 0.0 {
            push(
                &mut components,
                RuleFactor::ProcessingDelay,
                points,
                format!("{days:.0} days in process"),
            );
        }
    }

    if let Some(frequency) = features.communication_frequency {
        let points = if frequency < 0.3 {
            20.0
        } else if frequency < 0.7 {
            10.0
        } else if frequency > 2.0 {
            -8.0
        } else if frequency > 1.5 {
            -3.0
        } else {
            0.0
        };
        if points != 0.0 {
            push(
                &mut components,
                RuleFactor::Communication,
                points,
                format!("{frequency:.1} contacts per week"),
            );
        }
    }

    if let Some(count) = features.documents_submitted {
        let points = if count <= 2.0 {
            12.0
        } else if count <= 3.0 {
            5.0
        } else if count >= 5.0 {
            -3.0
        } else {
            0.0
        };
        if points != 0.0 {
            push(
                &mut components,
                RuleFactor::Documentation,
                points,
                format!("{count:.0} documents submitted"),
            );
        }
    }

    let score = features.credit_score;
    let credit = if score < 550.0 {
        10.0
    } else if score < 600.0 {
        5.0
    } else if score >= 750.0 {
        -5.0
    } else {
        0.0
    };
    if credit != 0.0 {
        push(
            &mut components,
            RuleFactor::CreditScore,
            credit,
            format!("credit score {score:.0}"),
        );
    }

    if ltv_known(features) {
        let ltv = features.ltv_ratio;
        let points = if ltv > 0.90 {
            8.0
        } else if ltv > 0.85 {
            4.0
        } else if ltv < 0.75 {
            -2.0
        } else {
            0.0
        };
        if points != 0.0 {
            push(
                &mut components,
                RuleFactor::LoanToValue,
                points,
                format!("loan-to-value {:.0}%", ltv * 100.0),
            );
        }
    }

    if dti_known(features) {
        let dti = features.dti_ratio;
        let points = if dti > 0.45 {
            8.0
        } else if dti > 0.40 {
            4.0
        } else if dti < 0.30 {
            -3.0
        } else {
            0.0
        };
        if points != 0.0 {
            push(
                &mut components,
                RuleFactor::DebtToIncome,
                points,
                format!("debt-to-income {dti:.2}"),
            );
        }
    }

    let total = components.iter().map(|component| component.points).sum();
    (components, total)
}
