use rand::seq::SliceRandom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub text: &'static str,
    pub author: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    High,
    Medium,
    Low,
}

const HIGH: [Quote; 2] = [
    Quote {
        text: "Excellence is not an act, but a habit.",
        author: "Aristotle",
    },
    Quote {
        text: "The future belongs to those who believe in the beauty of their dreams.",
        author: "Eleanor Roosevelt",
    },
];

const MEDIUM: [Quote; 2] = [
    Quote {
        text: "Believe you can and you're halfway there.",
        author: "Theodore Roosevelt",
    },
    Quote {
        text: "It does not matter how slowly you go as long as you do not stop.",
        author: "Confucius",
    },
];

const LOW: [Quote; 2] = [
    Quote {
        text: "Our greatest weakness lies in giving up. The most certain way to succeed is always to try just one more time.",
        author: "Thomas A. Edison",
    },
    Quote {
        text: "Fall seven times and stand up eight.",
        author: "Japanese Proverb",
    },
];

impl Tier {
    /// 80% and up is high, 50% and up is medium. An empty quiz counts as low.
    pub fn for_score(score: usize, total: usize) -> Self {
        if total == 0 {
            return Tier::Low;
        }
        // Integer form of `score / total >= 0.8` and `>= 0.5`.
        if score * 5 >= total * 4 {
            Tier::High
        } else if score * 2 >= total {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    pub fn quotes(&self) -> &'static [Quote] {
        match self {
            Tier::High => &HIGH,
            Tier::Medium => &MEDIUM,
            Tier::Low => &LOW,
        }
    }
}

pub fn motivational_quote(score: usize, total: usize) -> Quote {
    let quotes = Tier::for_score(score, total).quotes();
    // Tiers are never empty.
    *quotes.choose(&mut rand::thread_rng()).unwrap_or(&quotes[0])
}
