use super::{Difficulty, Question};

fn choice(id: u32, text: String, options: [&str; 4], correct: usize, explanation: String) -> Question {
    Question::Choice {
        id,
        text,
        correct_option: options[correct].to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        explanation: Some(explanation),
    }
}

fn free_response(id: u32, text: String, sample_answer: String, points: u32) -> Question {
    Question::FreeResponse {
        id,
        text,
        sample_answer,
        points,
    }
}

/// The fixed question set for `topic` at `difficulty`.
pub fn questions(topic: &str, difficulty: Difficulty) -> Vec<Question> {
    let topic = match topic.trim() {
        "" => "this topic",
        topic => topic,
    };

    match difficulty {
        Difficulty::Easy => vec![
            choice(
                1,
                format!("What is the main focus of {}?", topic),
                [
                    "Its core concepts and definitions",
                    "Unrelated historical trivia",
                    "Only the author's biography",
                    "Formatting rules",
                ],
                0,
                format!("A first pass over {} should always start from its core concepts.", topic),
            ),
            choice(
                2,
                format!("Which study habit helps most when starting with {}?", topic),
                [
                    "Skipping the introduction",
                    "Summarising each section in your own words",
                    "Reading only the last page",
                    "Memorising page numbers",
                ],
                1,
                "Writing your own summaries turns reading into active recall.".to_string(),
            ),
            choice(
                3,
                format!("True or false: key terms in {} are worth writing down.", topic),
                ["True", "False", "Only on exams", "Only in groups"],
                0,
                "Key terms are the vocabulary every later idea builds on.".to_string(),
            ),
        ],
        Difficulty::Medium => vec![
            choice(
                1,
                format!("Which statement best describes the purpose of {}?", topic),
                [
                    "It connects several related ideas into one framework",
                    "It is a single isolated fact",
                    "It has no practical use",
                    "It only matters for historians",
                ],
                0,
                format!("{} is best understood as a framework of related ideas.", topic),
            ),
            choice(
                2,
                format!("How would you apply {} to a new problem?", topic),
                [
                    "Ignore the problem's context",
                    "Identify which principles fit, then test them",
                    "Copy a previous answer verbatim",
                    "Pick an answer at random",
                ],
                1,
                "Applying knowledge means matching principles to the situation.".to_string(),
            ),
            choice(
                3,
                format!("Which of these is most closely related to {}?", topic),
                [
                    "An unrelated subject",
                    "A random example",
                    "Its supporting concepts and examples",
                    "The table of contents",
                ],
                2,
                "Related concepts and worked examples sit closest to the topic.".to_string(),
            ),
            choice(
                4,
                format!("What is a common misconception about {}?", topic),
                [
                    "That it can be mastered without practice",
                    "That it has definitions",
                    "That it can be studied",
                    "That it appears in the document",
                ],
                0,
                "Understanding comes from practice, not a single read-through.".to_string(),
            ),
            free_response(
                5,
                format!("In two or three sentences, explain {} to a classmate.", topic),
                format!(
                    "A good answer names the central idea of {}, gives one example and says why it matters.",
                    topic
                ),
                2,
            ),
        ],
        Difficulty::Hard => vec![
            choice(
                1,
                format!("Which assumption does {} rely on most heavily?", topic),
                [
                    "That its underlying premises hold in the given context",
                    "That no exceptions exist anywhere",
                    "That it never changes over time",
                    "That it applies to every field equally",
                ],
                0,
                "Advanced reasoning starts by checking the premises.".to_string(),
            ),
            choice(
                2,
                format!("How would you evaluate a claim made about {}?", topic),
                [
                    "Accept it if it sounds confident",
                    "Check evidence, sources and counter-examples",
                    "Reject anything new",
                    "Count how often it is repeated",
                ],
                1,
                "Evaluation weighs evidence against counter-examples.".to_string(),
            ),
            choice(
                3,
                format!("Which situation is the strongest edge case for {}?", topic),
                [
                    "The textbook example",
                    "A case covered in the introduction",
                    "A scenario where two of its principles conflict",
                    "A trivial restatement",
                ],
                2,
                "Conflicting principles expose the limits of a model.".to_string(),
            ),
            choice(
                4,
                format!("What distinguishes expert understanding of {}?", topic),
                [
                    "Reciting definitions",
                    "Knowing the page numbers",
                    "Speed of reading",
                    "Transferring it to unfamiliar problems",
                ],
                3,
                "Transfer to unfamiliar problems is the mark of deep learning.".to_string(),
            ),
            free_response(
                5,
                format!("Critically analyse one limitation of {}.", topic),
                format!(
                    "Identify a limitation of {}, explain where it breaks down and propose how to address it.",
                    topic
                ),
                3,
            ),
            free_response(
                6,
                format!("Design a short experiment or example that tests your understanding of {}.", topic),
                "Describe the setup, what you expect to happen and how the result confirms or refutes the idea."
                    .to_string(),
                3,
            ),
        ],
    }
}

/// Looks up the bank for a difficulty key. Unknown keys, and any bank that
/// comes back empty, fall back to the medium bank.
pub fn select(topic: &str, key: &str) -> (Difficulty, Vec<Question>) {
    let difficulty = Difficulty::from_key(key);
    let bank = questions(topic, difficulty);
    if bank.is_empty() {
        return (Difficulty::Medium, questions(topic, Difficulty::Medium));
    }
    (difficulty, bank)
}
