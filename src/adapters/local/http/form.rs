use axum::response::Html;

// GET /, a bare form for trying the service from a browser
pub async fn upload_form() -> Html<&'static str> {
    Html(
        r#"
        <!doctype html>
        <html>
            <head>
                <title>Encode something!</title>
            </head>
            <body>
                <h1>Submit a video for encoding</h1>
                <form action="/encode/start" method="post" enctype="multipart/form-data">
                    <div>
                        <label>
                            Video:
                            <input type="file" name="input_file" required>
                        </label>
                    </div>
                    <div>
                        <label>
                            Subtitles (.srt):
                            <input type="file" name="srt_file" accept=".srt">
                        </label>
                    </div>
                    <div>
                        <label>
                            Options (JSON):
                            <textarea name="options" rows="4" cols="40">{"ffmpeg_preset": "medium", "constant_rate_factor": 23, "stereo": true, "audio_bitrate": 128}</textarea>
                        </label>
                    </div>
                    <div>
                        <input type="submit" value="Encode">
                    </div>
                </form>
                <p>Poll <code>/encode/status/&lt;ticket_id&gt;</code>, then fetch <code>/encode/result/&lt;ticket_id&gt;</code>.</p>
            </body>
        </html>
        "#,
    )
}
