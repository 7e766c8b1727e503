use csrdesk::{CsrDesk, CsrError, DeskConfig, LoginForm, NotificationLevel};

/// Solve the challenge the way an operator would, from the rendered question.
fn solve(question: &str) -> u32 {
    question
        .trim_end_matches(" = ?")
        .split(" + ")
        .map(|operand| operand.parse::<u32>().unwrap())
        .sum()
}

#[test_log::test(tokio::test)]
async fn test_login_then_logout() {
    let desk = CsrDesk::from_config(DeskConfig::instant());
    let mut notifications = desk.notifier().subscribe();

    let answer = solve(&desk.login_gate().captcha_question());
    let session = desk
        .login_gate()
        .login(&LoginForm::new("control.room", "pa55word", answer.to_string()))
        .await
        .unwrap();
    assert_eq!(session.username, "control.room");

    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.level, NotificationLevel::Success);

    desk.login_gate().logout(session);
}

#[tokio::test]
async fn test_wrong_answer_then_retry() {
    let desk = CsrDesk::from_config(DeskConfig::instant());
    let answer = solve(&desk.login_gate().captcha_question());

    let err = desk
        .login_gate()
        .login(&LoginForm::new("control.room", "pa55word", (answer + 1).to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, CsrError::CaptchaMismatch));

    // Same challenge stays on screen until refreshed
    desk.login_gate()
        .login(&LoginForm::new("control.room", "pa55word", answer.to_string()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_refreshed_captcha_is_checked() {
    let mut desk = CsrDesk::from_config(DeskConfig::instant());
    desk.login_gate_mut().refresh_captcha();

    let answer = solve(&desk.login_gate().captcha_question());
    assert!((2..=20).contains(&answer));
    desk.login_gate()
        .login(&LoginForm::new("inspector", "secret", answer.to_string()))
        .await
        .unwrap();
}
