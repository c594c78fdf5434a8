//! Seed a demo survey: admin + respondent accounts, one survey, one
//! image question, and an assignment.

use oculo_storage_gateway::SurveyClient;
use oculo_survey_model::survey::{
    NewAssignment, NewQuestion, NewSurvey, NewUser, QuestionKind, Role,
};

pub async fn run(
    base_url: String,
    admin: String,
    respondent: String,
    image_url: String,
) -> anyhow::Result<()> {
    let client = SurveyClient::new(base_url);

    let admin = client
        .login(&NewUser {
            username: admin,
            role: Role::Admin,
        })
        .await?;
    let respondent = client
        .login(&NewUser {
            username: respondent,
            role: Role::Respondent,
        })
        .await?;

    let survey = client
        .create_survey(&NewSurvey {
            title: "Dermoscopy assessment".to_string(),
            description: "Review each lesion image and answer the questions.".to_string(),
            created_by: admin.id,
        })
        .await?;

    let question = client
        .create_question(&NewQuestion {
            survey_id: survey.id,
            question_text: "Is this lesion malignant?".to_string(),
            question_type: QuestionKind::Image,
            options: None,
            image_url: Some(image_url),
        })
        .await?;

    client
        .assign_survey(&NewAssignment {
            survey_id: survey.id,
            user_id: respondent.id,
        })
        .await?;

    println!("Seeded demo data:");
    println!("  admin       {} (id {})", admin.username, admin.id);
    println!(
        "  respondent  {} (id {})",
        respondent.username, respondent.id
    );
    println!("  survey      {} (id {})", survey.title, survey.id);
    println!("  question    id {}", question.id);
    println!();
    println!(
        "Capture a session with:\n  oculo capture --survey {} --user {} --question {}",
        survey.id, respondent.id, question.id
    );

    Ok(())
}
