//! Integration tests for the chatstream library.
//! These tests drive a real client against an in-process HTTP server.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    use chatstream::chat::{ChatSession, Renderer};
    use chatstream::{
        BodyEncoding, ChatClient, ChatConfig, ChatMessage, ChatRequest, ClientLogger, Error,
        ExchangeOutcome, Increment, StreamHandler,
    };

    const STREAM_HEAD: &str =
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";

    /// One step of a scripted response.
    enum Step {
        Send(String),
        /// Keep the connection open until the client goes away.
        Hold,
    }

    fn stream(body: &str) -> Vec<Step> {
        vec![Step::Send(format!("{STREAM_HEAD}{body}"))]
    }

    fn status(code: u16, reason: &str, body: &str) -> Vec<Step> {
        let length = body.len();
        vec![Step::Send(format!(
            "HTTP/1.1 {code} {reason}\r\nContent-Type: text/plain\r\n\
             Content-Length: {length}\r\nConnection: close\r\n\r\n{body}"
        ))]
    }

    #[derive(Debug)]
    struct Captured {
        request_line: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    }

    impl Captured {
        fn header(&self, name: &str) -> &str {
            self.headers.get(name).map(String::as_str).unwrap_or("")
        }

        fn form(&self) -> HashMap<String, String> {
            url::form_urlencoded::parse(&self.body).into_owned().collect()
        }

        fn body_text(&self) -> String {
            String::from_utf8_lossy(&self.body).into_owned()
        }
    }

    struct TestServer {
        url: String,
        requests: mpsc::UnboundedReceiver<Captured>,
    }

    impl TestServer {
        async fn next_request(&mut self) -> Captured {
            tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
                .await
                .expect("no request arrived")
                .expect("server went away")
        }
    }

    /// Serve one scripted response per connection, in order.
    async fn serve(scripts: Vec<Vec<Step>>) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            for script in scripts {
                let (mut socket, _) = listener.accept().await.unwrap();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let request = read_request(&mut socket).await;
                    let _ = tx.send(request);
                    for step in script {
                        match step {
                            Step::Send(text) => {
                                if socket.write_all(text.as_bytes()).await.is_err() {
                                    return;
                                }
                                let _ = socket.flush().await;
                            }
                            Step::Hold => {
                                let mut scratch = [0u8; 64];
                                while let Ok(n) = socket.read(&mut scratch).await {
                                    if n == 0 {
                                        break;
                                    }
                                }
                                return;
                            }
                        }
                    }
                    let _ = socket.shutdown().await;
                });
            }
        });
        TestServer {
            url: format!("http://{addr}/chat"),
            requests: rx,
        }
    }

    async fn read_request(socket: &mut TcpStream) -> Captured {
        let mut buf = Vec::new();
        let head_end = loop {
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos;
            }
            read_more(socket, &mut buf).await;
        };
        let head = String::from_utf8(buf[..head_end].to_vec()).unwrap();
        let mut body = buf[head_end + 4..].to_vec();

        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default().to_string();
        let headers: HashMap<String, String> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| {
                (name.trim().to_ascii_lowercase(), value.trim().to_string())
            })
            .collect();

        if let Some(length) = headers.get("content-length") {
            let length: usize = length.parse().unwrap();
            while body.len() < length {
                read_more(socket, &mut body).await;
            }
            body.truncate(length);
        } else if headers
            .get("transfer-encoding")
            .is_some_and(|value| value.eq_ignore_ascii_case("chunked"))
        {
            while !body.ends_with(b"0\r\n\r\n") {
                read_more(socket, &mut body).await;
            }
            body = dechunk(&body);
        }

        Captured {
            request_line,
            headers,
            body,
        }
    }

    async fn read_more(socket: &mut TcpStream, buf: &mut Vec<u8>) {
        let mut chunk = [0u8; 4096];
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed the connection mid-request");
        buf.extend_from_slice(&chunk[..n]);
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
    }

    fn dechunk(mut data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(line_end) = find(data, b"\r\n") {
            let size_line = std::str::from_utf8(&data[..line_end]).unwrap();
            let size_hex = size_line.split(';').next().unwrap_or_default().trim();
            let size = usize::from_str_radix(size_hex, 16).unwrap();
            if size == 0 {
                break;
            }
            let start = line_end + 2;
            out.extend_from_slice(&data[start..start + size]);
            data = &data[start + size + 2..];
        }
        out
    }

    fn config(url: &str) -> ChatConfig {
        ChatConfig::new(
            "imagine-gitbook-docs",
            "customer-support-bot",
            "Alex",
            url,
            "token2",
        )
    }

    fn urlencoded(url: &str) -> ChatConfig {
        config(url).with_body_encoding(BodyEncoding::UrlEncoded)
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Chunk(String),
        Complete,
        Error(Option<u16>, String),
    }

    /// Records every callback into a shared list.
    #[derive(Clone, Default)]
    struct Recorder {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl Recorder {
        fn record(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn chunks(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    Event::Chunk(text) => Some(text),
                    _ => None,
                })
                .collect()
        }
    }

    impl StreamHandler for Recorder {
        fn on_chunk(&mut self, text: &str) {
            self.record(Event::Chunk(text.to_string()));
        }

        fn on_complete(&mut self) {
            self.record(Event::Complete);
        }

        fn on_error(&mut self, error: Error) {
            let message = error.message().to_string();
            self.record(Event::Error(error.status_code(), message));
        }
    }

    #[tokio::test]
    async fn request_carries_headers_and_form_fields() {
        let mut server = serve(vec![stream("data: [DONE]\n")]).await;
        let client = ChatClient::new(urlencoded(&server.url)).unwrap();

        let mut unfinished = ChatMessage::streaming_assistant("bot-2");
        unfinished.push_str("partial");
        let history = vec![
            ChatMessage::assistant("welcome", "Hello!"),
            ChatMessage::user("user-1", "hi"),
            unfinished,
        ];
        let mut recorder = Recorder::default();
        let outcome = client
            .send("Where is my order?", &history, &mut recorder)
            .await;
        assert_eq!(outcome, ExchangeOutcome::Completed);
        assert_eq!(recorder.events(), vec![Event::Complete]);

        let request = server.next_request().await;
        assert_eq!(request.request_line, "POST /chat HTTP/1.1");
        assert_eq!(request.header("accept"), "text/event-stream");
        assert_eq!(request.header("x-ml-internal"), "true");
        assert_eq!(request.header("authorization"), "Bearer token2");
        assert_eq!(
            request.header("content-type"),
            "application/x-www-form-urlencoded"
        );

        let form = request.form();
        assert_eq!(form["user_id"], "imagine-gitbook-docs");
        assert_eq!(form["conversation_id"], "customer-support-bot");
        assert_eq!(form["prompt"], "Where is my order?");
        assert_eq!(form["agent_name"], "Alex");
        let history: Value = serde_json::from_str(&form["chat_history"]).unwrap();
        assert_eq!(
            history,
            json!([
                {"role": "assistant", "content": "Hello!"},
                {"role": "user", "content": "hi"},
            ])
        );
    }

    #[tokio::test]
    async fn multipart_body_carries_every_field() {
        let mut server = serve(vec![stream("data: [DONE]\n")]).await;
        let client = ChatClient::new(config(&server.url)).unwrap();

        let mut recorder = Recorder::default();
        let outcome = client.send("Where is my order?", &[], &mut recorder).await;
        assert_eq!(outcome, ExchangeOutcome::Completed);

        let request = server.next_request().await;
        assert!(
            request
                .header("content-type")
                .starts_with("multipart/form-data; boundary=")
        );
        let body = request.body_text();
        for field in [
            "user_id",
            "conversation_id",
            "prompt",
            "agent_name",
            "chat_history",
        ] {
            assert!(
                body.contains(&format!("name=\"{field}\"")),
                "missing {field}"
            );
        }
        assert!(body.contains("Where is my order?"));
        assert!(body.contains("customer-support-bot"));
        assert!(body.contains("\r\n[]\r\n"));
    }

    #[tokio::test]
    async fn records_stream_until_the_sentinel() {
        let body = concat!(
            "data: {\"content\":\"Hel\"}\n\n",
            "data: {\"content\":\"lo\"}\n\n",
            "data: [DONE]\n\n",
            "data: {\"content\":\"ignored\"}\n\n",
        );
        let server = serve(vec![stream(body)]).await;
        let client = ChatClient::new(config(&server.url)).unwrap();

        let mut recorder = Recorder::default();
        let outcome = client.send("hi", &[], &mut recorder).await;
        assert_eq!(outcome, ExchangeOutcome::Completed);
        assert_eq!(
            recorder.events(),
            vec![
                Event::Chunk("Hel".to_string()),
                Event::Chunk("lo".to_string()),
                Event::Complete,
            ]
        );
        assert!(!client.is_busy());
    }

    #[tokio::test]
    async fn mixed_framing_is_tolerated() {
        let body = concat!(
            ": keep-alive\n",
            "\n",
            "Your order shipped.\n",
            "data: not json\n",
            "data: {\"content\":\"\"}\n",
            "data: {\"other\":1}\n",
            "data: [1,2]\n",
        );
        let server = serve(vec![stream(body)]).await;
        let client = ChatClient::new(config(&server.url)).unwrap();

        let mut recorder = Recorder::default();
        let outcome = client.send("hi", &[], &mut recorder).await;
        assert_eq!(outcome, ExchangeOutcome::Completed);
        assert_eq!(
            recorder.events(),
            vec![
                Event::Chunk("Your order shipped.".to_string()),
                Event::Chunk("not json".to_string()),
                Event::Chunk("{\"other\":1}".to_string()),
                Event::Chunk("[1,2]".to_string()),
                Event::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn http_errors_reach_on_error() {
        let server = serve(vec![
            status(500, "Internal Server Error", "boom"),
            status(401, "Unauthorized", ""),
        ])
        .await;
        let client = ChatClient::new(config(&server.url)).unwrap();

        let mut recorder = Recorder::default();
        let outcome = client.send("hi", &[], &mut recorder).await;
        assert_eq!(outcome, ExchangeOutcome::Failed);
        assert_eq!(
            recorder.events(),
            vec![Event::Error(Some(500), "boom".to_string())]
        );

        let mut recorder = Recorder::default();
        let outcome = client.send("hi", &[], &mut recorder).await;
        assert_eq!(outcome, ExchangeOutcome::Failed);
        assert_eq!(
            recorder.events(),
            vec![Event::Error(Some(401), "Unauthorized".to_string())]
        );
        assert!(!client.is_busy());
    }

    #[tokio::test]
    async fn cancel_from_a_callback_is_silent() {
        let server = serve(vec![vec![
            Step::Send(format!(
                "{STREAM_HEAD}data: {{\"content\":\"first\"}}\ndata: {{\"content\":\"second\"}}\n"
            )),
            Step::Hold,
        ]])
        .await;
        let client = ChatClient::new(config(&server.url)).unwrap();
        let canceller = client.clone();

        let mut chunks = Vec::new();
        let mut completions = 0;
        let mut errors = 0;
        let mut handler = chatstream::Callbacks::new(
            |text: &str| {
                chunks.push(text.to_string());
                canceller.cancel();
            },
            || completions += 1,
            |_: Error| errors += 1,
        );
        let outcome = client.send("hi", &[], &mut handler).await;
        drop(handler);

        assert_eq!(outcome, ExchangeOutcome::Cancelled);
        assert_eq!(chunks, vec!["first".to_string()]);
        assert_eq!(completions, 0);
        assert_eq!(errors, 0);
        assert!(!client.is_busy());
    }

    #[tokio::test]
    async fn cancel_while_waiting_for_more_is_silent() {
        let server = serve(vec![vec![
            Step::Send(format!("{STREAM_HEAD}data: {{\"content\":\"first\"}}\n")),
            Step::Hold,
        ]])
        .await;
        let client = ChatClient::new(config(&server.url)).unwrap();

        let recorder = Recorder::default();
        let watcher = recorder.clone();
        let canceller = client.clone();
        let cancel_task = tokio::spawn(async move {
            while watcher.chunks().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            canceller.cancel();
        });

        let mut handler = recorder.clone();
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            client.send("hi", &[], &mut handler),
        )
        .await
        .expect("cancel did not unblock the read");
        cancel_task.await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::Cancelled);
        assert_eq!(recorder.events(), vec![Event::Chunk("first".to_string())]);
        assert!(!client.is_busy());
    }

    #[tokio::test]
    async fn second_send_cancels_the_first() {
        let server = serve(vec![
            vec![
                Step::Send(format!("{STREAM_HEAD}data: {{\"content\":\"one\"}}\n")),
                Step::Hold,
            ],
            stream("data: {\"content\":\"two\"}\n\ndata: [DONE]\n"),
        ])
        .await;
        let client = ChatClient::new(config(&server.url)).unwrap();

        let first = Recorder::default();
        let watcher = first.clone();
        let first_client = client.clone();
        let mut first_handler = first.clone();
        let first_task = tokio::spawn(async move {
            first_client.send("one", &[], &mut first_handler).await
        });
        while watcher.chunks().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let second = Recorder::default();
        let mut second_handler = second.clone();
        let outcome = client.send("two", &[], &mut second_handler).await;
        assert_eq!(outcome, ExchangeOutcome::Completed);

        let first_outcome = first_task.await.unwrap();
        assert_eq!(first_outcome, ExchangeOutcome::Cancelled);
        assert_eq!(first.events(), vec![Event::Chunk("one".to_string())]);
        assert_eq!(
            second.events(),
            vec![Event::Chunk("two".to_string()), Event::Complete]
        );
        assert!(!client.is_busy());
    }

    #[derive(Default)]
    struct Capture {
        prompts: Mutex<Vec<String>>,
        lines: Mutex<Vec<String>>,
        increments: Mutex<Vec<String>>,
        outcomes: Mutex<Vec<ExchangeOutcome>>,
    }

    impl ClientLogger for Capture {
        fn log_request(&self, request: &ChatRequest) {
            self.prompts.lock().unwrap().push(request.prompt.clone());
        }

        fn log_line(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }

        fn log_increment(&self, increment: &Increment) {
            self.increments.lock().unwrap().push(increment.text.clone());
        }

        fn log_outcome(&self, outcome: ExchangeOutcome) {
            self.outcomes.lock().unwrap().push(outcome);
        }
    }

    #[tokio::test]
    async fn logger_sees_the_whole_exchange() {
        let body = "data: {\"content\":\"hi\"}\n: ping\ndata: [DONE]\n";
        let server = serve(vec![stream(body)]).await;
        let capture = Arc::new(Capture::default());
        let client = ChatClient::new(config(&server.url))
            .unwrap()
            .with_logger(capture.clone());

        let mut recorder = Recorder::default();
        client.send("hello", &[], &mut recorder).await;

        assert_eq!(*capture.prompts.lock().unwrap(), vec!["hello".to_string()]);
        assert_eq!(
            *capture.lines.lock().unwrap(),
            vec![
                "data: {\"content\":\"hi\"}".to_string(),
                ": ping".to_string(),
                "data: [DONE]".to_string(),
            ]
        );
        assert_eq!(*capture.increments.lock().unwrap(), vec!["hi".to_string()]);
        assert_eq!(
            *capture.outcomes.lock().unwrap(),
            vec![ExchangeOutcome::Completed]
        );
    }

    struct Silent;

    impl Renderer for Silent {
        fn print_text(&mut self, _: &str) {}
        fn print_error(&mut self, _: &str) {}
        fn print_info(&mut self, _: &str) {}
        fn print_message(&mut self, _: &str, _: &ChatMessage) {}
        fn finish_response(&mut self) {}
        fn print_interrupted(&mut self) {}
    }

    #[tokio::test]
    async fn session_sends_earlier_turns_as_history() {
        let mut server = serve(vec![
            stream("data: {\"content\":\"Order shipped.\"}\n"),
            stream("data: {\"content\":\"Tomorrow.\"}\n"),
        ])
        .await;
        let client = ChatClient::new(urlencoded(&server.url)).unwrap();
        let mut session = ChatSession::new(client);
        let welcome = session.messages()[0].content.clone();

        let outcome = session
            .send_streaming("Where is my order?", &mut Silent)
            .await
            .unwrap();
        assert_eq!(outcome, ExchangeOutcome::Completed);
        let outcome = session
            .send_streaming("When will it arrive?", &mut Silent)
            .await
            .unwrap();
        assert_eq!(outcome, ExchangeOutcome::Completed);

        let first = server.next_request().await.form();
        let first: Value = serde_json::from_str(&first["chat_history"]).unwrap();
        assert_eq!(first, json!([{"role": "assistant", "content": welcome}]));

        let second = server.next_request().await.form();
        let second: Value = serde_json::from_str(&second["chat_history"]).unwrap();
        assert_eq!(
            second,
            json!([
                {"role": "assistant", "content": welcome},
                {"role": "user", "content": "Where is my order?"},
                {"role": "assistant", "content": "Order shipped."},
            ])
        );

        assert_eq!(session.message_count(), 5);
        assert_eq!(session.messages()[4].content, "Tomorrow.");
        assert!(!session.messages()[4].is_streaming());
    }
}
