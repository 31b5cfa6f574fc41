//! Rock-paper-scissors sub-dialogue detection
//!
//! There is no persisted game session. Game progress is inferred each turn
//! from the current message and the tail of retrieved memory text, as an
//! explicit three-state machine: Idle, AwaitingChoice, Resolved. The fuzzy
//! keyword matching is deliberate - it keeps the mini-game stateless and
//! resilient to restarts, at the cost of occasionally misfiring on
//! ambiguous phrasing.

use rand::Rng;

use crate::schema::{Emotion, GameOutcome, Hand};

/// Phrases that initiate a game
const INITIATION_KEYWORDS: &[&str] = &[
    "じゃんけんしよう",
    "じゃんけんぽん",
    "じゃんけんしよ",
    "じゃんけんする",
    "rock paper scissors",
];

const ROCK_KEYWORDS: &[&str] = &["rock", "グー", "ぐー"];
const PAPER_KEYWORDS: &[&str] = &["paper", "パー", "ぱー"];
const SCISSORS_KEYWORDS: &[&str] = &["scissors", "チョキ", "ちょき"];

/// Phrases the assistant emits when prompting for a hand. Their presence in
/// the memory tail marks the AwaitingChoice state.
const AWAITING_CHOICE_MARKERS: &[&str] = &["何出す？", "じゃんけんぽん！", "出す手を選んでね！"];

/// Reply emitted when the user initiates without picking a hand. Contains an
/// AwaitingChoice marker so the next turn can recognize the pending game.
const CHOICE_PROMPT: &str = "いいよ！じゃんけんしよう！最初はグー、じゃんけんぽん！何出す？";

/// Inferred game state for one (user, character) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// No game is active
    Idle,
    /// The assistant most recently prompted the user to pick a hand
    AwaitingChoice,
}

/// Classification of the current turn
#[derive(Debug, Clone, PartialEq)]
pub enum GameTurn {
    /// A move was completed this turn
    Resolved {
        user_hand: Hand,
        ai_hand: Hand,
        outcome: GameOutcome,
        reply: String,
    },
    /// The user initiated a game without picking a hand
    Prompted { reply: String },
    /// No game action; the turn falls through to the language model
    NotAGame,
}

/// Infer the game phase from the retrieved memory tail
pub fn infer_phase(memory_tail: &str) -> GamePhase {
    if AWAITING_CHOICE_MARKERS.iter().any(|m| memory_tail.contains(m)) {
        GamePhase::AwaitingChoice
    } else {
        GamePhase::Idle
    }
}

/// Classify the current turn from the user message and the memory tail.
///
/// Rules are evaluated in order:
/// 1. initiation keyword + hand keyword in the same message -> resolve now
/// 2. initiation keyword only -> prompt for a hand
/// 3. hand keyword while AwaitingChoice -> resolve as a continuation
/// 4. otherwise -> not a game turn
pub fn detect<R: Rng>(message: &str, memory_tail: &str, rng: &mut R) -> GameTurn {
    let lowered = message.to_lowercase();
    let initiated = INITIATION_KEYWORDS.iter().any(|k| lowered.contains(k));
    let user_hand = hand_in(&lowered);

    if initiated {
        return match user_hand {
            Some(hand) => resolve(hand, rng, false),
            None => GameTurn::Prompted {
                reply: CHOICE_PROMPT.to_string(),
            },
        };
    }

    if let Some(hand) = user_hand {
        if infer_phase(memory_tail) == GamePhase::AwaitingChoice {
            return resolve(hand, rng, true);
        }
    }

    GameTurn::NotAGame
}

/// Find the first hand keyword present in a lower-cased message
fn hand_in(lowered: &str) -> Option<Hand> {
    if ROCK_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        Some(Hand::Rock)
    } else if PAPER_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        Some(Hand::Paper)
    } else if SCISSORS_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        Some(Hand::Scissors)
    } else {
        None
    }
}

/// Outcome from the user's perspective: rock beats scissors, scissors beats
/// paper, paper beats rock, identical hands draw.
pub fn outcome_of(user: Hand, ai: Hand) -> GameOutcome {
    if user == ai {
        return GameOutcome::Draw;
    }
    match (user, ai) {
        (Hand::Rock, Hand::Scissors)
        | (Hand::Scissors, Hand::Paper)
        | (Hand::Paper, Hand::Rock) => GameOutcome::Win,
        _ => GameOutcome::Lose,
    }
}

fn resolve<R: Rng>(user_hand: Hand, rng: &mut R, continuation: bool) -> GameTurn {
    let ai_hand = Hand::ALL[rng.gen_range(0..Hand::ALL.len())];
    let outcome = outcome_of(user_hand, ai_hand);

    let opening = if continuation {
        format!(
            "あなたは{}、私は{}！",
            user_hand.as_japanese(),
            ai_hand.as_japanese()
        )
    } else {
        format!(
            "じゃんけんぽん！あなたは{}、私は{}！",
            user_hand.as_japanese(),
            ai_hand.as_japanese()
        )
    };

    let closing = match outcome {
        GameOutcome::Win => "あなたの勝ちだね！すごい！",
        GameOutcome::Lose => "私の勝ち！やったー！",
        GameOutcome::Draw => "あいこだったね！もう一回する？",
    };

    GameTurn::Resolved {
        user_hand,
        ai_hand,
        outcome,
        reply: format!("{}{}", opening, closing),
    }
}

/// Fixed heuristic emotion vector for a resolved game turn. The character is
/// happiest when it wins (user loses) and consoling when it loses.
pub fn heuristic_emotion(outcome: GameOutcome) -> Emotion {
    match outcome {
        // User lost: the character won and is delighted
        GameOutcome::Lose => Emotion::new(0.2, 0.7, 0.0, 0.1),
        // User won: a moderate consoling mix
        GameOutcome::Win => Emotion::new(0.6, 0.2, 0.1, 0.1),
        GameOutcome::Draw => Emotion::new(0.5, 0.3, 0.1, 0.1),
    }
}

/// Emotion for the prompting turn - playful anticipation
pub fn prompt_emotion() -> Emotion {
    Emotion::new(0.4, 0.5, 0.0, 0.0)
}
