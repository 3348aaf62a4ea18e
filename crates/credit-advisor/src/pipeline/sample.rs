//! Seeded generator of realistic labelled applications for demos and bootstrapping a model.
//!
//! Outcomes follow a noisy lending score so that a model trained on the batch stays well below
//! perfect accuracy.

use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::domain::{fields, ApplicantRecord, ApplicationOutcome, TrainingRecord};
use super::features::monthly_payment;
use super::rates::InterestRateEstimator;

pub const DEFAULT_SAMPLE_SEED: u64 = 42;

#[derive(Debug)]
pub struct SampleGenerator {
    rng: StdRng,
    rates: InterestRateEstimator,
}

impl SampleGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            rates: InterestRateEstimator::default(),
        }
    }

    pub fn generate(&mut self, count: usize) -> Vec<TrainingRecord> {
        (0..count).map(|_| self.application()).collect()
    }

    fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1: f64 = self.rng.random_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.random::<f64>();
        mean + std_dev * (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
    }

    fn pick<T: Copy>(&mut self, options: &[(T, f64)]) -> T {
        let total: f64 = options.iter().map(|(_, weight)| weight).sum();
        let mut draw = self.rng.random_range(0.0..total);
        for (value, weight) in options {
            if draw < *weight {
                return *value;
            }
            draw -= weight;
        }
        options[options.len() - 1].0
    }

    fn application(&mut self) -> TrainingRecord {
        let age = self.rng.random_range(25..65) as f64;
        let gender = self.pick(&[("Male", 0.55), ("Female", 0.45)]);
        let marital_status = self.pick(&[
            ("Single", 0.3),
            ("Married", 0.5),
            ("Divorced", 0.15),
            ("Widowed", 0.05),
        ]);
        let employment_status = self.pick(&[("Employed", 0.8), ("Self-Employed", 0.2)]);
        let employment_months = self.normal(36.0, 24.0).max(0.0).round();

        let monthly_income = if employment_status == "Employed" {
            self.normal(10.5, 0.6).exp().max(15_000.0)
        } else {
            self.normal(10.3, 0.8).exp().max(12_000.0)
        }
        .min(200_000.0);
        let monthly_income = (monthly_income * 100.0).round() / 100.0;

        let credit_score = self.normal(650.0, 80.0).round().clamp(300.0, 850.0);

        let multiplier = self.rng.random_range(2.5..6.0);
        let property_price = ((monthly_income * 12.0 * multiplier) / 10_000.0).round() * 10_000.0;
        let down_share = if credit_score >= 700.0 {
            self.rng.random_range(0.15..0.25)
        } else {
            self.rng.random_range(0.10..0.30)
        };
        let down_payment = (property_price * down_share).round();
        let loan_amount = property_price - down_payment;

        let years = self.pick(&[(15.0, 0.2), (20.0, 0.4), (25.0, 0.3), (30.0, 0.1)]);
        let term_months = years * 12.0;
        let interest_rate = self.rates.estimate(credit_score, term_months, &mut self.rng);
        let payment = monthly_payment(loan_amount, interest_rate, term_months);
        let dti = if monthly_income > 0.0 {
            payment / monthly_income
        } else {
            0.0
        };
        let ltv = if property_price > 0.0 {
            loan_amount / property_price
        } else {
            0.0
        };

        let lending_score = lending_score(credit_score, dti, ltv, employment_months, monthly_income)
            + self.rng.random_range(-15.0..15.0)
            + self.rng.random_range(-10.0..10.0);
        let outcome = self.outcome(lending_score);

        let variation = self.rng.random_range(0.8..1.2);
        let (days, documents, communication) = match outcome {
            ApplicationOutcome::Approved => (
                (self.normal(25.0, 8.0) * variation).max(5.0),
                self.rng.random_range(3..6),
                (self.normal(2.0, 0.5) * variation).max(0.5),
            ),
            ApplicationOutcome::Declined => (
                (self.normal(18.0, 7.0) * variation).max(3.0),
                self.rng.random_range(1..5),
                (self.normal(1.0, 0.4) * variation).max(0.1),
            ),
            ApplicationOutcome::Withdrawn => (
                (self.normal(35.0, 15.0) * variation).max(5.0),
                self.rng.random_range(1..5),
                (self.normal(0.8, 0.4) * variation).max(0.1),
            ),
            ApplicationOutcome::InProcess => (
                (self.normal(15.0, 8.0) * variation).max(1.0),
                self.rng.random_range(2..6),
                (self.normal(1.5, 0.6) * variation).max(0.2),
            ),
        };

        let record = ApplicantRecord::new()
            .with_number(fields::AGE, age)
            .with_text(fields::GENDER, gender)
            .with_text(fields::MARITAL_STATUS, marital_status)
            .with_text(fields::EMPLOYMENT_STATUS, employment_status)
            .with_number(fields::EMPLOYMENT_DURATION_MONTHS, employment_months)
            .with_number(fields::MONTHLY_INCOME, monthly_income)
            .with_number(fields::CREDIT_SCORE, credit_score)
            .with_number(fields::PROPERTY_PRICE, property_price)
            .with_number(fields::DOWN_PAYMENT, down_payment)
            .with_number(fields::LOAN_AMOUNT, loan_amount)
            .with_number(fields::LOAN_DURATION_MONTHS, term_months)
            .with_number(fields::INTEREST_RATE, (interest_rate * 100.0).round() / 100.0)
            .with_number(fields::DAYS_IN_PROCESS, days.floor())
            .with_number(fields::DOCUMENTS_SUBMITTED, documents as f64)
            .with_number(
                fields::COMMUNICATION_FREQUENCY,
                (communication.clamp(0.1, 5.0) * 100.0).round() / 100.0,
            )
            .with_text(fields::PRODUCT_TYPE, "Mortgage");

        TrainingRecord::new(record, outcome)
    }

    fn outcome(&mut self, score: f64) -> ApplicationOutcome {
        use ApplicationOutcome::{Approved, Declined, InProcess, Withdrawn};

        if score >= 80.0 {
            self.pick(&[(Approved, 0.85), (InProcess, 0.15)])
        } else if score >= 65.0 {
            self.pick(&[(Approved, 0.6), (InProcess, 0.35), (Withdrawn, 0.05)])
        } else if score >= 45.0 {
            self.pick(&[
                (Approved, 0.25),
                (InProcess, 0.4),
                (Declined, 0.25),
                (Withdrawn, 0.1),
            ])
        } else if score >= 25.0 {
            self.pick(&[
                (Declined, 0.5),
                (InProcess, 0.3),
                (Withdrawn, 0.15),
                (Approved, 0.05),
            ])
        } else {
            self.pick(&[(Declined, 0.7), (Withdrawn, 0.25), (InProcess, 0.05)])
        }
    }
}

/// Underwriting-style score in [0, 100] before noise.
fn lending_score(credit: f64, dti: f64, ltv: f64, employment_months: f64, income: f64) -> f64 {
    let credit_points = match credit {
        c if c >= 720.0 => 40.0,
        c if c >= 680.0 => 35.0,
        c if c >= 640.0 => 25.0,
        c if c >= 600.0 => 15.0,
        c if c >= 550.0 => 5.0,
        _ => 0.0,
    };
    let dti_points = match dti {
        d if d <= 0.28 => 30.0,
        d if d <= 0.36 => 25.0,
        d if d <= 0.43 => 15.0,
        d if d <= 0.50 => 5.0,
        _ => 0.0,
    };
    let ltv_points = match ltv {
        l if l <= 0.80 => 20.0,
        l if l <= 0.85 => 15.0,
        l if l <= 0.90 => 10.0,
        l if l <= 0.95 => 5.0,
        _ => 0.0,
    };
    let employment_points = match employment_months {
        m if m >= 24.0 => 5.0,
        m if m >= 12.0 => 3.0,
        m if m >= 6.0 => 1.0,
        _ => 0.0,
    };
    let income_points = match income {
        i if i >= 60_000.0 => 5.0,
        i if i >= 40_000.0 => 3.0,
        i if i >= 25_000.0 => 1.0,
        _ => 0.0,
    };

    credit_points + dti_points + ltv_points + employment_points + income_points
}

/// Generates `count` labelled applications from `seed`.
pub fn generate_batch(count: usize, seed: u64) -> Vec<TrainingRecord> {
    SampleGenerator::new(seed).generate(count)
}
