use askama::Template;
use axum::{
    extract::Form,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use session_shield_axum::{IntoResponseError, ShieldContext, set_session_identity};

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    member_id: i64,
    outcome: String,
}

pub(crate) async fn index(ctx: ShieldContext) -> impl IntoResponse {
    let template = IndexTemplate {
        member_id: ctx.member_id,
        outcome: format!("{:?}", ctx.outcome),
    };
    render(template)
}

#[derive(Deserialize, Debug)]
pub(crate) struct LoginForm {
    member_id: i64,
}

/// Pretend login: binds whatever member id the form names to the session.
/// The shield notices the identity change on the next request and rotates
/// both verifiers.
pub(crate) async fn login(ctx: ShieldContext, Form(form): Form<LoginForm>) -> Response {
    change_identity(ctx, form.member_id).await
}

pub(crate) async fn logout(ctx: ShieldContext) -> Response {
    change_identity(ctx, 0).await
}

async fn change_identity(ctx: ShieldContext, member_id: i64) -> Response {
    let Some(session_id) = ctx.session_id else {
        return Redirect::to("/").into_response();
    };

    match set_session_identity(&session_id, member_id)
        .await
        .into_response_error()
    {
        Ok(()) => {
            tracing::info!(member_id, "Session identity changed");
            Redirect::to("/").into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[derive(Template)]
#[template(path = "comment.html")]
struct CommentTemplate<'a> {
    member_id: i64,
    comments: &'a [String],
}

#[derive(Deserialize, Debug)]
pub(crate) struct CommentForm {
    message: String,
}

pub(crate) async fn comment(ctx: ShieldContext) -> impl IntoResponse {
    render(CommentTemplate {
        member_id: ctx.member_id,
        comments: &[],
    })
}

/// Only reached when the shield accepted the CSRF token from the hidden
/// form field the companion script added
pub(crate) async fn comment_post(
    ctx: ShieldContext,
    Form(form): Form<CommentForm>,
) -> impl IntoResponse {
    tracing::info!(member_id = ctx.member_id, "Comment accepted: {:?}", form);
    render(CommentTemplate {
        member_id: ctx.member_id,
        comments: &[form.message],
    })
}

fn render<T: Template>(template: T) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
