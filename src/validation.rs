//! Request validation for posted activity scores and completed activities.
//!
//! All rules are checked and every violation is reported, not just the first.

use crate::domain::ActivityType;
use crate::protocol::{ActivityScoreIn, CompleteActivityIn};
use crate::scoring::ActivityAttempt;

/// An activity score that passed validation, with its final score.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedScore {
  pub activity_type: ActivityType,
  pub score: u32,
}

pub fn validate_activity_score(input: &ActivityScoreIn) -> Result<ValidatedScore, Vec<String>> {
  let mut errors = Vec::new();

  for (field, value) in [("userId", &input.user_id), ("moduleId", &input.module_id), ("activityId", &input.activity_id)] {
    if value.trim().is_empty() {
      errors.push(format!("{} is required", field));
    }
  }

  let activity_type = ActivityType::parse(&input.activity_type);
  if activity_type.is_none() {
    errors.push(format!(
      "activityType must be one of: {}",
      ActivityType::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
    ));
  }

  if input.total_questions == 0 {
    errors.push("totalQuestions must be at least 1".into());
  }
  if input.correct_answers as u64 + input.incorrect_answers as u64 != input.total_questions as u64 {
    errors.push("correctAnswers + incorrectAnswers must equal totalQuestions".into());
  }

  if let Some(score) = input.score {
    if !(0..=100).contains(&score) {
      errors.push("score must be between 0 and 100".into());
    }
  }

  match activity_type {
    Some(ActivityType::Trivia) if input.correct_streak.is_none() => {
      errors.push("correctStreak is required for trivia activities".into())
    }
    Some(ActivityType::DragDrop) if input.correct_placements.is_none() => {
      errors.push("correctPlacements is required for drag_drop activities".into())
    }
    Some(ActivityType::Matching) if input.correct_matches.is_none() => {
      errors.push("correctMatches is required for matching activities".into())
    }
    _ => {}
  }

  for (field, value) in [("correctPlacements", input.correct_placements), ("correctMatches", input.correct_matches)] {
    if value.is_some_and(|v| v > input.total_questions) {
      errors.push(format!("{} must not exceed totalQuestions", field));
    }
  }

  let Some(activity_type) = activity_type.filter(|_| errors.is_empty()) else {
    return Err(errors);
  };
  let score = match input.score {
    Some(s) => s as u32,
    None => attempt_from_input(input, activity_type).score(),
  };
  if score > 100 {
    return Err(vec![format!("computed score {} is outside 0..=100", score)]);
  }
  Ok(ValidatedScore { activity_type, score })
}

/// Check a completed activity before anything is scored or written.
pub fn validate_completion(input: &CompleteActivityIn) -> Result<(), Vec<String>> {
  let mut errors = Vec::new();
  if input.user_id.trim().is_empty() {
    errors.push("userId is required".to_string());
  }
  if input.module_id.trim().is_empty() {
    errors.push("moduleId is required".to_string());
  }

  let attempt = &input.attempt;
  let (correct_field, total_field) = match attempt {
    ActivityAttempt::Trivia { .. } | ActivityAttempt::Interactive { .. } => ("correct", "total"),
    ActivityAttempt::DragDrop { .. } => ("correctPlacements", "totalItems"),
    ActivityAttempt::Matching { .. } => ("correctMatches", "totalPairs"),
  };
  if attempt.total() == 0 {
    errors.push(format!("{} must be at least 1", total_field));
  }
  if attempt.correct_answers() > attempt.total() {
    errors.push(format!("{} must not exceed {}", correct_field, total_field));
  }

  if errors.is_empty() && attempt.score() > 100 {
    errors.push(format!("computed score {} is outside 0..=100", attempt.score()));
  }
  if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Scoring input for a posted activity; the generic counters fill in
/// for type-specific ones that were not sent.
pub fn attempt_from_input(input: &ActivityScoreIn, activity_type: ActivityType) -> ActivityAttempt {
  match activity_type {
    ActivityType::Trivia => ActivityAttempt::Trivia {
      correct: input.correct_answers,
      total: input.total_questions,
      time_spent_seconds: input.time_spent,
      correct_streak: input.correct_streak.unwrap_or(0),
    },
    ActivityType::DragDrop => ActivityAttempt::DragDrop {
      correct_placements: input.correct_placements.unwrap_or(input.correct_answers),
      total_items: input.total_questions,
      incorrect_attempts: input.incorrect_attempts.unwrap_or(input.incorrect_answers),
      completion_time_seconds: input.time_spent,
    },
    ActivityType::Matching => ActivityAttempt::Matching {
      correct_matches: input.correct_matches.unwrap_or(input.correct_answers),
      total_pairs: input.total_questions,
      incorrect_matches: input.incorrect_matches.unwrap_or(input.incorrect_answers),
      attempts_per_pair: input.attempts_per_pair.clone().unwrap_or_default(),
    },
    ActivityType::Interactive => ActivityAttempt::Interactive {
      correct: input.correct_answers,
      total: input.total_questions,
    },
  }
}
