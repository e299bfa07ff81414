pub mod quotes;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
}

impl QuizQuestion {
    pub fn new(question: impl Into<String>, options: Vec<String>, correct_answer_index: usize) -> Self {
        Self {
            question: question.into(),
            options,
            correct_answer_index,
        }
    }

    /// How an option is shown in the review once the quiz is over.
    pub fn mark(&self, option: usize, answer: Option<usize>) -> OptionMark {
        if option == self.correct_answer_index {
            OptionMark::Correct
        } else if answer == Some(option) {
            OptionMark::UserIncorrect
        } else {
            OptionMark::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionMark {
    Correct,
    UserIncorrect,
    Neutral,
}

/// A quiz being taken: one answer slot per question, `None` until chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Quiz {
    questions: Vec<QuizQuestion>,
    answers: Vec<Option<usize>>,
    current_question: usize,
}

impl Quiz {
    pub fn new(questions: Vec<QuizQuestion>) -> Self {
        let answers = vec![None; questions.len()];
        Self {
            questions,
            answers,
            current_question: 0,
        }
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn answers(&self) -> &[Option<usize>] {
        &self.answers
    }

    pub fn current_index(&self) -> usize {
        self.current_question
    }

    pub fn current(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.current_question)
    }

    pub fn current_answer(&self) -> Option<usize> {
        self.answers.get(self.current_question).copied().flatten()
    }

    pub fn is_last(&self) -> bool {
        self.current_question + 1 >= self.questions.len()
    }

    /// Records `option` for the current question, replacing any earlier choice.
    /// Returns false when the option does not exist.
    pub fn answer(&mut self, option: usize) -> bool {
        let Some(question) = self.questions.get(self.current_question) else {
            return false;
        };
        if option >= question.options.len() {
            return false;
        }
        self.answers[self.current_question] = Some(option);
        true
    }

    /// Moves to the next question. Returns false on the last question.
    pub fn advance(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.current_question += 1;
        true
    }

    pub fn score(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.answers)
            .filter(|(q, a)| **a == Some(q.correct_answer_index))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn question(correct: usize) -> QuizQuestion {
        QuizQuestion::new(
            format!("q{correct}"),
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct,
        )
    }

    #[test]
    fn score_counts_matching_answers() {
        let mut quiz = Quiz::new(vec![question(0), question(1), question(2)]);
        for (i, answer) in [0, 1, 3].into_iter().enumerate() {
            assert!(quiz.answer(answer));
            if i < 2 {
                assert!(quiz.advance());
            }
        }
        assert!(!quiz.advance());
        assert_eq!(quiz.score(), 2);
    }

    #[test]
    fn answers_are_overwritable_and_bounded() {
        let mut quiz = Quiz::new(vec![question(2)]);
        assert_eq!(quiz.current_answer(), None);
        assert!(quiz.answer(0));
        assert!(quiz.answer(2));
        assert_eq!(quiz.current_answer(), Some(2));
        assert!(!quiz.answer(4));
        assert_eq!(quiz.current_answer(), Some(2));
    }

    #[test]
    fn review_marks() {
        let q = question(1);
        assert_eq!(q.mark(1, Some(3)), OptionMark::Correct);
        assert_eq!(q.mark(3, Some(3)), OptionMark::UserIncorrect);
        assert_eq!(q.mark(0, Some(3)), OptionMark::Neutral);
        assert_eq!(q.mark(1, Some(1)), OptionMark::Correct);
        assert_eq!(q.mark(2, None), OptionMark::Neutral);
    }

    proptest! {
        #[test]
        fn answers_track_questions(
            correct in prop::collection::vec(0usize..4, 1..10),
            picks in prop::collection::vec(0usize..6, 0..20),
        ) {
            let mut quiz = Quiz::new(correct.iter().map(|c| question(*c)).collect());
            prop_assert_eq!(quiz.answers().len(), quiz.questions().len());

            for pick in picks {
                quiz.answer(pick);
                quiz.advance();
                prop_assert_eq!(quiz.answers().len(), quiz.questions().len());
            }

            let expected = quiz
                .questions()
                .iter()
                .zip(quiz.answers())
                .filter(|(q, a)| **a == Some(q.correct_answer_index))
                .count();
            prop_assert_eq!(quiz.score(), expected);
            prop_assert!(quiz.score() <= quiz.questions().len());
        }
    }
}
