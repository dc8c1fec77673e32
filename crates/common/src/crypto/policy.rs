//! Access policies over clinician attributes
//!
//! ```text
//! Policy := Term (OR Term)*
//! Term   := Factor (AND Factor)*
//! Factor := Attribute | '(' Policy ')'
//! ```
//!
//! Operators are case-insensitive. Attributes are normalized to upper case.
//! `NOT` is rejected: a policy must be monotone so that holding more
//! attributes never loses access.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

/// Most DNF clauses a policy may expand to
pub const MAX_CLAUSES: usize = 64;

/// Upper-case an attribute name
pub fn normalize_attribute(attribute: &str) -> String {
    attribute.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("policy is empty")]
    Empty,
    #[error("unexpected token in policy: {0}")]
    UnexpectedToken(String),
    #[error("negation is not supported in access policies")]
    Negation,
    #[error("policy expands to {0} clauses, more than {max}", max = MAX_CLAUSES)]
    TooManyClauses(usize),
}

/// Parsed access policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    Attribute(String),
    And(Box<Policy>, Box<Policy>),
    Or(Box<Policy>, Box<Policy>),
}

impl Policy {
    pub fn parse(input: &str) -> Result<Self, PolicyError> {
        let mut parser = Parser::new(input);
        parser.parse()
    }

    /// All attributes the policy mentions
    pub fn attributes(&self) -> BTreeSet<String> {
        match self {
            Policy::Attribute(a) => BTreeSet::from([a.clone()]),
            Policy::And(l, r) | Policy::Or(l, r) => {
                let mut set = l.attributes();
                set.extend(r.attributes());
                set
            }
        }
    }

    pub fn is_satisfied_by(&self, attributes: &HashSet<String>) -> bool {
        match self {
            Policy::Attribute(a) => attributes.contains(a),
            Policy::And(l, r) => l.is_satisfied_by(attributes) && r.is_satisfied_by(attributes),
            Policy::Or(l, r) => l.is_satisfied_by(attributes) || r.is_satisfied_by(attributes),
        }
    }

    /// Disjunctive normal form: the policy holds iff some clause is a subset
    /// of the holder's attributes. Duplicate and subsumed clauses are dropped.
    ///
    /// # Errors
    ///
    /// `PolicyError::TooManyClauses` once any expansion step would exceed
    /// `MAX_CLAUSES`. The check runs before the cross product is built.
    pub fn clauses(&self) -> Result<Vec<BTreeSet<String>>, PolicyError> {
        let raw = match self {
            Policy::Attribute(a) => vec![BTreeSet::from([a.clone()])],
            Policy::Or(l, r) => {
                let mut out = l.clauses()?;
                out.extend(r.clauses()?);
                out
            }
            Policy::And(l, r) => {
                let left = l.clauses()?;
                let right = r.clauses()?;
                let product = left.len().saturating_mul(right.len());
                if product > MAX_CLAUSES {
                    return Err(PolicyError::TooManyClauses(product));
                }
                let mut out = Vec::with_capacity(product);
                for a in &left {
                    for b in &right {
                        out.push(a.union(b).cloned().collect());
                    }
                }
                out
            }
        };

        let mut minimal: Vec<BTreeSet<String>> = Vec::new();
        for clause in raw {
            if minimal.iter().any(|m| m.is_subset(&clause)) {
                continue;
            }
            minimal.retain(|m| !clause.is_subset(m));
            minimal.push(clause);
        }
        if minimal.len() > MAX_CLAUSES {
            return Err(PolicyError::TooManyClauses(minimal.len()));
        }
        Ok(minimal)
    }
}

impl FromStr for Policy {
    type Err = PolicyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Policy::parse(s)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Attribute(a) => write!(f, "{}", a),
            Policy::And(l, r) => write!(f, "({} AND {})", l, r),
            Policy::Or(l, r) => write!(f, "({} OR {})", l, r),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Attribute(String),
    And,
    Or,
    Not,
    LeftParen,
    RightParen,
    Eof,
}

fn tokenize(input: &str) -> Result<Vec<Token>, PolicyError> {
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0;
    let mut tokens = Vec::new();

    while pos < chars.len() {
        let ch = chars[pos];
        if ch.is_whitespace() {
            pos += 1;
            continue;
        }
        match ch {
            '(' => {
                tokens.push(Token::LeftParen);
                pos += 1;
            }
            ')' => {
                tokens.push(Token::RightParen);
                pos += 1;
            }
            c if c.is_alphanumeric() || c == '_' || c == '-' => {
                let start = pos;
                while pos < chars.len()
                    && (chars[pos].is_alphanumeric() || chars[pos] == '_' || chars[pos] == '-')
                {
                    pos += 1;
                }
                let ident: String = chars[start..pos].iter().collect();
                tokens.push(match ident.to_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    _ => Token::Attribute(normalize_attribute(&ident)),
                });
            }
            other => return Err(PolicyError::UnexpectedToken(other.to_string())),
        }
    }
    tokens.push(Token::Eof);
    Ok(tokens)
}

struct Parser {
    tokens: Result<Vec<Token>, PolicyError>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Parser {
            tokens: tokenize(input),
            pos: 0,
        }
    }

    fn current(&self) -> Token {
        match &self.tokens {
            Ok(tokens) => tokens.get(self.pos).cloned().unwrap_or(Token::Eof),
            Err(_) => Token::Eof,
        }
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn parse(&mut self) -> Result<Policy, PolicyError> {
        if let Err(e) = &self.tokens {
            return Err(e.clone());
        }
        if self.current() == Token::Eof {
            return Err(PolicyError::Empty);
        }
        let policy = self.parse_policy()?;
        match self.current() {
            Token::Eof => Ok(policy),
            token => Err(PolicyError::UnexpectedToken(format!("{:?}", token))),
        }
    }

    fn parse_policy(&mut self) -> Result<Policy, PolicyError> {
        let mut left = self.parse_term()?;
        while self.current() == Token::Or {
            self.advance();
            let right = self.parse_term()?;
            left = Policy::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Policy, PolicyError> {
        let mut left = self.parse_factor()?;
        while self.current() == Token::And {
            self.advance();
            let right = self.parse_factor()?;
            left = Policy::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Policy, PolicyError> {
        match self.current() {
            Token::Attribute(a) => {
                self.advance();
                Ok(Policy::Attribute(a))
            }
            Token::LeftParen => {
                self.advance();
                let inner = self.parse_policy()?;
                if self.current() != Token::RightParen {
                    return Err(PolicyError::UnexpectedToken(format!("{:?}", self.current())));
                }
                self.advance();
                Ok(inner)
            }
            Token::Not => Err(PolicyError::Negation),
            token => Err(PolicyError::UnexpectedToken(format!("{:?}", token))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn attrs(list: &[&str]) -> HashSet<String> {
        list.iter().map(|a| normalize_attribute(a)).collect()
    }

    #[test]
    fn test_parse_single_attribute() {
        let policy = Policy::parse("doctor").unwrap();
        assert_eq!(policy, Policy::Attribute("DOCTOR".to_string()));
    }

    #[test]
    fn test_parse_nested() {
        let policy = Policy::parse("((DOCTOR and CARDIOLOGY) or ADMIN)").unwrap();
        assert!(matches!(policy, Policy::Or(_, _)));
        assert_eq!(policy.attributes().len(), 3);
    }

    #[test]
    fn test_satisfaction() {
        let policy = Policy::parse("(DOCTOR AND CARDIOLOGY) OR ADMIN").unwrap();
        assert!(policy.is_satisfied_by(&attrs(&["doctor", "cardiology"])));
        assert!(policy.is_satisfied_by(&attrs(&["admin"])));
        assert!(!policy.is_satisfied_by(&attrs(&["doctor", "nurse"])));
        assert!(!policy.is_satisfied_by(&attrs(&[])));
    }

    #[test]
    fn test_clauses_distribute_and_over_or() {
        let policy = Policy::parse("(DOCTOR OR NURSE) AND CARDIOLOGY").unwrap();
        let clauses = policy.clauses().unwrap();
        assert_eq!(clauses.len(), 2);
        assert!(clauses.contains(&BTreeSet::from(["DOCTOR".to_string(), "CARDIOLOGY".to_string()])));
        assert!(clauses.contains(&BTreeSet::from(["NURSE".to_string(), "CARDIOLOGY".to_string()])));
    }

    #[test]
    fn test_clauses_drop_subsumed() {
        let policy = Policy::parse("ADMIN OR (ADMIN AND DOCTOR)").unwrap();
        assert_eq!(
            policy.clauses().unwrap(),
            vec![BTreeSet::from(["ADMIN".to_string()])]
        );
    }

    #[test]
    fn test_clause_expansion_is_capped() {
        // 2^20 clauses if fully expanded
        let factors: Vec<String> = (0..20).map(|i| format!("(A{i} OR B{i})")).collect();
        let policy = Policy::parse(&factors.join(" AND ")).unwrap();
        assert!(matches!(
            policy.clauses(),
            Err(PolicyError::TooManyClauses(n)) if n > MAX_CLAUSES
        ));

        // 2^6 clauses is exactly the limit
        let factors: Vec<String> = (0..6).map(|i| format!("(A{i} OR B{i})")).collect();
        let policy = Policy::parse(&factors.join(" AND ")).unwrap();
        assert_eq!(policy.clauses().unwrap().len(), MAX_CLAUSES);
    }

    #[test]
    fn test_wide_disjunction_is_capped() {
        let attrs: Vec<String> = (0..=MAX_CLAUSES).map(|i| format!("A{i}")).collect();
        let policy = Policy::parse(&attrs.join(" OR ")).unwrap();
        assert_eq!(
            policy.clauses(),
            Err(PolicyError::TooManyClauses(MAX_CLAUSES + 1))
        );
    }

    #[test]
    fn test_rejects_negation() {
        assert_eq!(Policy::parse("NOT ADMIN"), Err(PolicyError::Negation));
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(Policy::parse(""), Err(PolicyError::Empty));
        assert!(Policy::parse("(DOCTOR AND").is_err());
        assert!(Policy::parse("DOCTOR ADMIN").is_err());
        assert!(Policy::parse("DOCTOR & ADMIN").is_err());
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        let policy = Policy::parse("(doctor and cardiology) or admin").unwrap();
        let reparsed = Policy::parse(&policy.to_string()).unwrap();
        assert_eq!(policy, reparsed);
    }
}
