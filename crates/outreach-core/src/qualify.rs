//! Qualification predicate over parsed survey answers.

pub const AGE_MIN: i64 = 25;
pub const AGE_MAX: i64 = 35;

/// Lower-case keywords, any of which must appear in the education answer.
pub const REQUIRED_EDUCATION: &[&str] = &["higher", "высшее"];

/// Age and education as read from a positional answer list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAnswers {
    pub age: i64,
    pub education: String,
}

impl ParsedAnswers {
    /// Read `answers[0]` as an integer age and `answers[1]` as education.
    ///
    /// An absent or non-numeric age becomes 0, an absent education becomes "".
    pub fn from_answers(answers: &[String]) -> Self {
        let age = answers
            .first()
            .and_then(|a| a.trim().parse::<i64>().ok())
            .unwrap_or(0);
        let education = answers.get(1).cloned().unwrap_or_default();
        Self { age, education }
    }

    pub fn qualifies(&self) -> bool {
        qualifies(self.age, &self.education)
    }
}

pub fn qualifies(age: i64, education: &str) -> bool {
    let education = education.to_lowercase();
    (AGE_MIN..=AGE_MAX).contains(&age)
        && REQUIRED_EDUCATION.iter().any(|k| education.contains(k))
}
