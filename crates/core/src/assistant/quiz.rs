use crate::types::QuizQuestion;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuizGrade {
    pub correct: usize,
    pub total: usize,
    /// One flag per question; unanswered questions are wrong.
    pub outcomes: Vec<bool>,
}

impl QuizGrade {
    pub fn all_correct(&self) -> bool {
        self.total > 0 && self.correct == self.total
    }
}

/// Scores `answers` (selected option index per question) against the key.
/// Pure: the same inputs always give the same grade.
pub fn grade_quiz(questions: &[QuizQuestion], answers: &[Option<usize>]) -> QuizGrade {
    let outcomes: Vec<bool> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| answers.get(i).copied().flatten() == Some(q.correct_index))
        .collect();

    QuizGrade {
        correct: outcomes.iter().filter(|ok| **ok).count(),
        total: questions.len(),
        outcomes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct_index: usize) -> QuizQuestion {
        QuizQuestion {
            question: "q".to_string(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index,
            explanation: String::new(),
        }
    }

    #[test]
    fn test_grading_counts_exact_matches() {
        let questions = vec![question(0), question(2), question(3)];
        let grade = grade_quiz(&questions, &[Some(0), Some(1), None]);
        assert_eq!(grade.correct, 1);
        assert_eq!(grade.total, 3);
        assert_eq!(grade.outcomes, vec![true, false, false]);
        assert!(!grade.all_correct());

        assert_eq!(grade, grade_quiz(&questions, &[Some(0), Some(1), None]));
    }

    #[test]
    fn test_extra_answers_are_ignored() {
        let grade = grade_quiz(&[question(1)], &[Some(1), Some(3)]);
        assert!(grade.all_correct());
        assert_eq!(grade.outcomes, vec![true]);
    }
}
