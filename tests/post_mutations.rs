use axum::http::StatusCode;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

mod support;

use support::{SMALL_GIF, TestApp, location, multipart_body, read_body};

#[tokio::test]
async fn guest_create_form_redirects_to_login() {
    let app = TestApp::new();

    let response = app.get("/create/").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/?next=%2Fcreate%2F");
}

#[tokio::test]
async fn member_publishes_and_lands_on_their_profile() {
    let app = TestApp::new();
    let cookie = app.register("walt").await;

    let form = multipart_body(&[("text", "Fresh words"), ("group", "")], None);
    let response = app.post_multipart_as("/create/", &cookie, form).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/walt/");

    assert_eq!(app.repos.post_count().await, 1);
    let post = app.repos.latest_post().await.expect("post stored");
    assert_eq!(post.text, "Fresh words");
    assert_eq!(post.group_id, None);
    assert_eq!(post.image_path, None);
}

#[tokio::test]
async fn post_can_be_filed_under_a_group() {
    let app = TestApp::new();
    let cookie = app.register("walt").await;
    let club = app.repos.seed_group("Reading club", "reading-club").await;

    let form = multipart_body(
        &[("text", "Tonight we start a new book"), ("group", &club.id.to_string())],
        None,
    );
    let response = app.post_multipart_as("/create/", &cookie, form).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let post = app.repos.latest_post().await.expect("post stored");
    assert_eq!(post.group_id, Some(club.id));
}

#[tokio::test]
async fn blank_text_redisplays_the_form() {
    let app = TestApp::new();
    let cookie = app.register("walt").await;

    let form = multipart_body(&[("text", "   "), ("group", "")], None);
    let response = app.post_multipart_as("/create/", &cookie, form).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_body(response).await;
    assert!(body.contains("Post text cannot be empty."));
    assert_eq!(app.repos.post_count().await, 0);
}

#[tokio::test]
async fn unknown_group_choice_redisplays_the_form() {
    let app = TestApp::new();
    let cookie = app.register("walt").await;

    let form = multipart_body(
        &[("text", "Stray text"), ("group", &Uuid::new_v4().to_string())],
        None,
    );
    let response = app.post_multipart_as("/create/", &cookie, form).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_body(response).await;
    assert!(body.contains("Select one of the listed groups."));
    // The submission is carried back into the form.
    assert!(body.contains("Stray text"));
    assert_eq!(app.repos.post_count().await, 0);
}

#[tokio::test]
async fn tampered_group_value_is_an_unknown_choice() {
    let app = TestApp::new();
    let cookie = app.register("walt").await;

    let form = multipart_body(&[("text", "Stray text"), ("group", "junk")], None);
    let response = app.post_multipart_as("/create/", &cookie, form).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_body(response).await;
    assert!(body.contains("Select one of the listed groups."));
    assert_eq!(app.repos.post_count().await, 0);
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let app = TestApp::new();
    let cookie = app.register("walt").await;

    let form = multipart_body(
        &[("text", "With an attachment"), ("group", "")],
        Some(("notes.txt", "text/plain", b"just some text")),
    );
    let response = app.post_multipart_as("/create/", &cookie, form).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_body(response).await;
    assert!(body.contains("Upload a valid image."));
    assert_eq!(app.repos.post_count().await, 0);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let app = TestApp::with_upload_limit(1024);
    let cookie = app.register("walt").await;

    let oversized = vec![0u8; 4096];
    let form = multipart_body(
        &[("text", "Too big"), ("group", "")],
        Some(("big.gif", "image/gif", &oversized)),
    );
    let response = app.post_multipart_as("/create/", &cookie, form).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.repos.post_count().await, 0);
}

#[tokio::test]
async fn author_edits_their_post_without_moving_it() {
    let app = TestApp::new();
    let cookie = app.register("walt").await;
    let author = app.user("walt").await;
    let club = app.repos.seed_group("Reading club", "reading-club").await;
    let published = OffsetDateTime::now_utc() - Duration::days(3);
    let post = app
        .repos
        .seed_post(&author, Some(&club), "First draft", published)
        .await;

    let form = multipart_body(&[("text", "Rewritten words"), ("group", "")], None);
    let response = app
        .post_multipart_as(&format!("/posts/{}/edit/", post.id), &cookie, form)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));

    let updated = app.repos.post(post.id).await.expect("post kept");
    assert_eq!(updated.text, "Rewritten words");
    assert_eq!(updated.group_id, None);
    assert_eq!(updated.pub_date, published);
}

#[tokio::test]
async fn edit_without_a_new_file_keeps_the_image() {
    let app = TestApp::new();
    let cookie = app.register("walt").await;

    let form = multipart_body(
        &[("text", "Picture day"), ("group", "")],
        Some(("pic.gif", "image/gif", SMALL_GIF)),
    );
    let response = app.post_multipart_as("/create/", &cookie, form).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let post = app.repos.latest_post().await.expect("post stored");
    let image_path = post.image_path.clone().expect("image stored");

    let form = multipart_body(&[("text", "Picture day, revised"), ("group", "")], None);
    let response = app
        .post_multipart_as(&format!("/posts/{}/edit/", post.id), &cookie, form)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let updated = app.repos.post(post.id).await.expect("post kept");
    assert_eq!(updated.text, "Picture day, revised");
    assert_eq!(updated.image_path, Some(image_path));
}

#[tokio::test]
async fn non_author_edit_is_quietly_redirected_to_the_post() {
    let app = TestApp::new();
    app.register("walt").await;
    let intruder_cookie = app.register("june").await;
    let author = app.user("walt").await;
    let post = app
        .repos
        .seed_post(&author, None, "Original words", OffsetDateTime::now_utc())
        .await;
    let edit_path = format!("/posts/{}/edit/", post.id);
    let detail_path = format!("/posts/{}/", post.id);

    let form_page = app.get_as(&edit_path, &intruder_cookie).await;
    assert_eq!(form_page.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&form_page), detail_path);

    let form = multipart_body(&[("text", "Defaced"), ("group", "")], None);
    let submit = app
        .post_multipart_as(&edit_path, &intruder_cookie, form)
        .await;
    assert_eq!(submit.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&submit), detail_path);

    let untouched = app.repos.post(post.id).await.expect("post kept");
    assert_eq!(untouched.text, "Original words");
}

#[tokio::test]
async fn guest_edit_redirects_to_login() {
    let app = TestApp::new();
    let author = app.repos.seed_user("walt").await;
    let post = app
        .repos
        .seed_post(&author, None, "Someone elses words", OffsetDateTime::now_utc())
        .await;

    let response = app.get(&format!("/posts/{}/edit/", post.id)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("/auth/login/?next=%2Fposts%2F{}%2Fedit%2F", post.id)
    );
}

#[tokio::test]
async fn edit_of_unknown_post_is_not_found() {
    let app = TestApp::new();
    let cookie = app.register("walt").await;

    let response = app
        .get_as(&format!("/posts/{}/edit/", Uuid::new_v4()), &cookie)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comment_lands_on_the_detail_page() {
    let app = TestApp::new();
    let cookie = app.register("june").await;
    let author = app.repos.seed_user("walt").await;
    let post = app
        .repos
        .seed_post(&author, None, "A quiet evening", OffsetDateTime::now_utc())
        .await;
    let detail_path = format!("/posts/{}/", post.id);

    let response = app
        .post_form_as(&format!("/posts/{}/comment/", post.id), &cookie, "text=Well+said")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), detail_path);

    let body = read_body(app.get(&detail_path).await).await;
    assert!(body.contains("Well said"));
    assert!(body.contains("june"));
}

#[tokio::test]
async fn blank_comment_leaves_no_trace() {
    let app = TestApp::new();
    let cookie = app.register("june").await;
    let author = app.repos.seed_user("walt").await;
    let post = app
        .repos
        .seed_post(&author, None, "A quiet evening", OffsetDateTime::now_utc())
        .await;

    let response = app
        .post_form_as(&format!("/posts/{}/comment/", post.id), &cookie, "text=%20%20")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));
    assert_eq!(app.repos.comment_count().await, 0);
}

#[tokio::test]
async fn guest_comment_is_sent_to_login_and_back() {
    let app = TestApp::new();
    let author = app.repos.seed_user("walt").await;
    let post = app
        .repos
        .seed_post(&author, None, "A quiet evening", OffsetDateTime::now_utc())
        .await;
    let comment_path = format!("/posts/{}/comment/", post.id);

    let response = app.post_form(&comment_path, "text=Hello").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("/auth/login/?next=%2Fposts%2F{}%2Fcomment%2F", post.id)
    );

    // After logging in the browser GETs the comment URL; the viewer is sent
    // on to the post itself.
    let cookie = app.register("june").await;
    let follow_up = app.get_as(&comment_path, &cookie).await;
    assert_eq!(follow_up.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&follow_up), format!("/posts/{}/", post.id));
}

#[tokio::test]
async fn comment_on_unknown_post_is_not_found() {
    let app = TestApp::new();
    let cookie = app.register("june").await;

    let response = app
        .post_form_as(
            &format!("/posts/{}/comment/", Uuid::new_v4()),
            &cookie,
            "text=Hello",
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
