use std::collections::HashSet;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use crate::api::*;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_OPTIONS: usize = 2;
pub const MIN_ODDS: Decimal = dec!(1.0);
pub const SUGGESTED_TAGS: [&str; 5] = ["Placement", "Sports", "Event", "Person", "#other"];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormError {
    #[error("All fields are required")]
    MissingFields,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least 6 characters long")]
    PasswordTooShort,
    #[error("Title and at least 2 options with labels are required.")]
    IncompleteQuestion,
    #[error("Option \"{0}\" appears more than once")]
    DuplicateOption(String),
    #[error("Odds for \"{0}\" must be at least 1")]
    OddsTooLow(String),
    #[error("Question text is required")]
    MissingQuestionText,
    #[error("At least 2 options are required")]
    TooFewOptions,
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}
impl RegisterForm {
    pub fn validate(&self) -> Result<RegisterRequest, FormError> {
        let username = self.username.trim();
        let email = self.email.trim();
        if username.is_empty()
            || email.is_empty()
            || self.password.is_empty()
            || self.confirm_password.is_empty()
        {
            return Err(FormError::MissingFields);
        }
        if self.password != self.confirm_password {
            return Err(FormError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(FormError::PasswordTooShort);
        }
        Ok(RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}
impl LoginForm {
    pub fn validate(&self) -> Result<LoginRequest, FormError> {
        let email = self.email.trim();
        if email.is_empty() || self.password.is_empty() {
            return Err(FormError::MissingFields);
        }
        Ok(LoginRequest {
            email: email.to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuestionForm {
    pub title: String,
    pub description: String,
    pub options: Vec<(String, Decimal)>,
    pub tags: Vec<String>,
}
impl QuestionForm {
    pub fn from_question(question: &Question) -> Self {
        Self {
            title: question.title.clone(),
            description: question.description.clone(),
            options: question
                .options
                .iter()
                .map(|option| (option.label.clone(), option.odds))
                .collect(),
            tags: question.tags.clone(),
        }
    }
    pub fn validate(&self, existing: Option<&Question>) -> Result<QuestionRequest, FormError> {
        let options = self
            .options
            .iter()
            .map(|(label, odds)| {
                let label = label.trim();
                QuestionOption {
                    label: label.to_string(),
                    votes: existing
                        .and_then(|question| question.option(label))
                        .map(|option| option.votes)
                        .unwrap_or(0),
                    odds: *odds,
                }
            })
            .collect();
        let request = QuestionRequest {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            options,
            tags: normalize_tags(&self.tags),
        };
        check_question(&request)?;
        Ok(request)
    }
}
pub fn check_question(request: &QuestionRequest) -> Result<(), FormError> {
    if request.title.trim().is_empty()
        || request.options.len() < MIN_OPTIONS
        || request
            .options
            .iter()
            .any(|option| option.label.trim().is_empty())
    {
        return Err(FormError::IncompleteQuestion);
    }
    let mut seen = HashSet::new();
    for option in &request.options {
        if !seen.insert(option.label.trim()) {
            return Err(FormError::DuplicateOption(option.label.clone()));
        }
        if option.odds < MIN_ODDS {
            return Err(FormError::OddsTooLow(option.label.clone()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct SuggestionForm {
    pub question_text: String,
    pub options: Vec<String>,
    pub multipliers: Vec<Decimal>,
    pub tags: Vec<String>,
}
impl SuggestionForm {
    pub fn validate(&self) -> Result<SuggestionRequest, FormError> {
        let request = clean_suggestion(SuggestionRequest {
            question_text: self.question_text.clone(),
            options: self.options.clone(),
            multipliers: self.multipliers.clone(),
            tags: self.tags.clone(),
        });
        check_suggestion(&request)?;
        Ok(request)
    }
}
pub fn clean_suggestion(request: SuggestionRequest) -> SuggestionRequest {
    let (options, multipliers): (Vec<String>, Vec<Decimal>) = request
        .options
        .iter()
        .enumerate()
        .filter(|(_, option)| !option.trim().is_empty())
        .map(|(i, option)| {
            let multiplier = request.multipliers.get(i).copied().unwrap_or_else(default_odds);
            (option.trim().to_string(), multiplier)
        })
        .unzip();
    SuggestionRequest {
        question_text: request.question_text.trim().to_string(),
        options,
        multipliers,
        tags: normalize_tags(&request.tags),
    }
}
pub fn check_suggestion(request: &SuggestionRequest) -> Result<(), FormError> {
    if request.question_text.trim().is_empty() {
        return Err(FormError::MissingQuestionText);
    }
    let options: Vec<(&String, Decimal)> = request
        .options
        .iter()
        .enumerate()
        .filter(|(_, option)| !option.trim().is_empty())
        .map(|(i, option)| {
            let multiplier = request.multipliers.get(i).copied().unwrap_or_else(default_odds);
            (option, multiplier)
        })
        .collect();
    if options.len() < MIN_OPTIONS {
        return Err(FormError::TooFewOptions);
    }
    for (option, multiplier) in options {
        if multiplier < MIN_ODDS {
            return Err(FormError::OddsTooLow(option.to_string()));
        }
    }
    Ok(())
}
pub fn approval_from(suggestion: &Suggestion) -> ApproveSuggestionRequest {
    let suggested_by = suggestion
        .suggested_by
        .as_ref()
        .map(|suggester| suggester.username.as_str())
        .unwrap_or("unknown");
    ApproveSuggestionRequest {
        title: suggestion.question_text.clone(),
        description: format!("Suggested by {}", suggested_by),
        options: suggestion
            .options
            .iter()
            .enumerate()
            .map(|(i, label)| QuestionOption {
                label: label.clone(),
                votes: 0,
                odds: suggestion
                    .multipliers
                    .get(i)
                    .copied()
                    .unwrap_or_else(default_odds),
            })
            .collect(),
        tags: suggestion.tags.clone(),
    }
}
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty() && seen.insert(tag.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn register(password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            username: " alice ".to_string(),
            email: "alice@campus.edu".to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn register_rules() {
        assert_eq!(
            RegisterForm::default().validate(),
            Err(FormError::MissingFields)
        );
        assert_eq!(
            register("secret1", "secret2").validate(),
            Err(FormError::PasswordMismatch)
        );
        assert_eq!(
            register("abc", "abc").validate(),
            Err(FormError::PasswordTooShort)
        );
        let request = register("secret", "secret").validate().unwrap();
        assert_eq!(request.username, "alice");

        let login = LoginForm {
            email: "  ".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(login.validate(), Err(FormError::MissingFields));
    }

    #[test]
    fn question_rules() {
        let mut form = QuestionForm {
            title: "Who wins the final?".to_string(),
            options: vec![("Team Alpha".to_string(), dec!(1.5))],
            ..Default::default()
        };
        assert_eq!(form.validate(None), Err(FormError::IncompleteQuestion));
        form.options.push((" ".to_string(), dec!(1.5)));
        assert_eq!(form.validate(None), Err(FormError::IncompleteQuestion));
        form.options[1].0 = "Team Alpha".to_string();
        assert_eq!(
            form.validate(None),
            Err(FormError::DuplicateOption("Team Alpha".to_string()))
        );
        form.options[1] = ("Team Beta".to_string(), dec!(0.9));
        assert_eq!(
            form.validate(None),
            Err(FormError::OddsTooLow("Team Beta".to_string()))
        );
        form.options[1].1 = dec!(2);
        form.tags = vec!["Sports".to_string(), " Sports".to_string()];
        let request = form.validate(None).unwrap();
        assert_eq!(request.tags, vec!["Sports"]);
        assert!(request.options.iter().all(|option| option.votes == 0));
    }

    #[test]
    fn editing_keeps_wagered_tokens() {
        let existing = Question {
            id: "final".to_string(),
            title: "Who wins the final?".to_string(),
            description: String::new(),
            options: vec![
                QuestionOption {
                    label: "Team Alpha".to_string(),
                    votes: 20,
                    odds: dec!(1.5),
                },
                QuestionOption {
                    label: "Team Beta".to_string(),
                    votes: 15,
                    odds: dec!(1.5),
                },
            ],
            is_resolved: false,
            correct_option: None,
            tags: vec![],
        };
        let mut form = QuestionForm::from_question(&existing);
        form.options[1].0 = "Team Gamma".to_string();
        form.options[0].1 = dec!(1.8);
        let request = form.validate(Some(&existing)).unwrap();
        assert_eq!(request.options[0].votes, 20);
        assert_eq!(request.options[0].odds, dec!(1.8));
        assert_eq!(request.options[1].votes, 0);
    }

    #[test]
    fn suggestion_rules() {
        let mut form = SuggestionForm {
            question_text: "  ".to_string(),
            options: vec!["Yes".to_string(), "".to_string(), "No".to_string()],
            multipliers: vec![dec!(2.0), dec!(9.9)],
            tags: vec![],
        };
        assert_eq!(form.validate(), Err(FormError::MissingQuestionText));
        form.question_text = "Will the library open on Sunday?".to_string();
        let request = form.validate().unwrap();
        assert_eq!(request.options, vec!["Yes", "No"]);
        assert_eq!(request.multipliers, vec![dec!(2.0), dec!(1.5)]);

        let raw = SuggestionRequest {
            question_text: "Will the library open on Sunday?".to_string(),
            options: vec!["Yes".to_string(), " ".to_string(), "No".to_string()],
            multipliers: vec![dec!(2), dec!(0.5), dec!(4)],
            tags: vec![],
        };
        assert_eq!(check_suggestion(&raw), Ok(()));
        let cleaned = clean_suggestion(raw);
        assert_eq!(cleaned.options, vec!["Yes", "No"]);
        assert_eq!(cleaned.multipliers, vec![dec!(2), dec!(4)]);

        form.options = vec!["Yes".to_string(), " ".to_string()];
        assert_eq!(form.validate(), Err(FormError::TooFewOptions));
        form.options.push("No".to_string());
        form.multipliers = vec![dec!(0.5)];
        assert_eq!(
            form.validate(),
            Err(FormError::OddsTooLow("Yes".to_string()))
        );
    }

    #[test]
    fn approval_prefill() {
        let suggestion = Suggestion {
            id: "s1".to_string(),
            question_text: "Will it snow in May?".to_string(),
            options: vec!["Yes".to_string(), "No".to_string()],
            multipliers: vec![dec!(3)],
            tags: vec!["Event".to_string()],
            status: SuggestionStatus::Pending,
            suggested_by: Some(Suggester {
                username: "bob".to_string(),
            }),
            created_at: None,
        };
        let approval = approval_from(&suggestion);
        assert_eq!(approval.description, "Suggested by bob");
        assert_eq!(approval.options[0].odds, dec!(3));
        assert_eq!(approval.options[1].odds, dec!(1.5));
        assert_eq!(approval.title, "Will it snow in May?");
    }

    #[test]
    fn tags_are_normalized() {
        let tags: Vec<String> = ["Sports", " ", "#other", "Sports ", "Event"]
            .iter()
            .map(|tag| tag.to_string())
            .collect();
        assert_eq!(normalize_tags(&tags), vec!["Sports", "#other", "Event"]);
        assert_eq!(SUGGESTED_TAGS.len(), 5);
    }
}
