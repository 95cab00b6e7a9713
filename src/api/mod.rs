mod game;
mod impls;
mod requests;
mod responses;
mod util;

pub use game::*;
pub use requests::*;
pub use responses::*;
pub use util::*;

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn question_from_backend_json() {
        let question: Question = serde_json::from_str(
            r#"{
                "_id": "64f1",
                "title": "Will the campus fest be postponed?",
                "options": [
                    { "label": "Yes", "votes": 12, "odds": 1.8 },
                    { "label": "No", "votes": "8" },
                    { "label": "Maybe", "votes": "lots" },
                    { "label": "Later" }
                ],
                "isResolved": false
            }"#,
        )
        .unwrap();
        assert_eq!(question.id, "64f1");
        assert_eq!(question.description, "");
        let votes: Vec<Tokens> = question.options.iter().map(|o| o.votes).collect();
        assert_eq!(votes, vec![12, 8, 0, 0]);
        assert_eq!(question.options[0].odds, dec!(1.8));
        assert_eq!(question.options[1].odds, dec!(1.5));
        assert_eq!(question.resolution(), Resolution::Unresolved);
        assert_eq!(question.pool(), 20);
    }

    #[test]
    fn tokens_alias_and_resolution() {
        let question: Question = serde_json::from_str(
            r#"{
                "id": "q1",
                "title": "Who wins the final?",
                "options": [{ "label": "Team Alpha", "tokens": 20 }],
                "isResolved": true,
                "correctOption": "Team Alpha"
            }"#,
        )
        .unwrap();
        assert_eq!(question.options[0].votes, 20);
        assert_eq!(question.resolution(), Resolution::Resolved("Team Alpha"));
        assert!(question.option("Team Beta").is_none());
    }

    #[test]
    fn bad_odds_fall_back_per_option() {
        let questions: Vec<Question> = serde_json::from_str(
            r#"[{
                "_id": "q1",
                "title": "Who wins the final?",
                "options": [
                    { "label": "Team Alpha", "votes": 10, "odds": null },
                    { "label": "Team Beta", "votes": 5, "odds": "1.8" },
                    { "label": "Team Gamma", "odds": 0 },
                    { "label": "Team Delta", "odds": "high" },
                    { "label": "Team Omega", "odds": 2.25 }
                ]
            }]"#,
        )
        .unwrap();
        let odds: Vec<_> = questions[0].options.iter().map(|o| o.odds).collect();
        assert_eq!(odds, vec![dec!(1.5), dec!(1.8), dec!(1.5), dec!(1.5), dec!(2.25)]);
    }

    #[test]
    fn bet_record_with_multiplier_and_timestamp() {
        let bet: Bet = serde_json::from_str(
            r#"{
                "_id": "b1",
                "question": "Will the campus fest be postponed?",
                "option": "Yes",
                "amount": 10,
                "multiplier": 3.33,
                "win": 33.3,
                "timestamp": "2024-05-01T10:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(bet.odds, dec!(3.33));
        let placed_at = bet.created_at.unwrap();
        assert_eq!(placed_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        let bet: Bet = serde_json::from_str(
            r#"{"question":"q1","option":"No","amount":5,"odds":null}"#,
        )
        .unwrap();
        assert_eq!(bet.odds, dec!(1.5));
    }

    #[test]
    fn error_body_message() {
        assert_eq!(
            error_message(r#"{"message":"Insufficient tokens"}"#),
            Some("Insufficient tokens".to_string())
        );
        assert_eq!(error_message(r#"{"message":"  "}"#), None);
        assert_eq!(error_message("Bad Gateway"), None);
    }

    #[test]
    fn role_defaults_to_user() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"_id":"u1","username":"alice","tokens":40}"#).unwrap();
        assert_eq!(profile.role, Role::User);
        assert_eq!(profile.winnings, 0);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }
}
