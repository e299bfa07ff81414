use std::future::Future;
use std::sync::Arc;

use dotenv::dotenv;
use log::{debug, error, info, warn};
use study_buddy_bot::config::Config;
use study_buddy_bot::gateway::{Difficulty, GeminiConfig, GeminiGateway, ModelGateway};
use study_buddy_bot::locks::ChatLocks;
use study_buddy_bot::panels::chat::{ChatEvent, ChatOutcome, TurnRequest};
use study_buddy_bot::panels::quiz::{QuizEvent, QuizOutcome, QuizRequest};
use study_buddy_bot::panels::summarize::{SummarizeEvent, SummarizeOutcome, SummaryRequest};
use study_buddy_bot::panels::{PanelError, PanelKind};
use study_buddy_bot::render::{self, Screen};
use study_buddy_bot::state::{quiz_event, State};
use teloxide::{
    dispatching::dialogue::{ErasedStorage, InMemStorage, Storage},
    prelude::*,
    types::{ChatAction, ParseMode},
    utils::command::BotCommands,
};

type StudyDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerError = Box<dyn std::error::Error + Send + Sync>;
type HandlerResult = Result<(), HandlerError>;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "open the main menu.")]
    Start,
    #[command(description = "go back to the panel menu.")]
    Menu,
    #[command(description = "start the current panel over.")]
    Restart,
    #[command(description = "set how many quiz questions to generate (1-10).")]
    Questions(String),
    #[command(description = "show this text.")]
    Help,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    pretty_env_logger::init();
    info!("Starting study buddy bot...");

    let config = Config::from_env()?;
    debug!("Loaded {:?}", config);

    let gateway: Arc<dyn ModelGateway> = Arc::new(GeminiGateway::new(GeminiConfig::from(&config))?);
    let locks = Arc::new(ChatLocks::new());
    let storage: Arc<ErasedStorage<State>> = InMemStorage::<State>::new().erase();

    let bot = Bot::new(config.telegram_token.clone());
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Could not register bot commands: {}", e);
    }

    let handler = Update::filter_message()
        .enter_dialogue::<Message, ErasedStorage<State>, State>()
        .branch(dptree::entry().filter_command::<Command>().endpoint(command))
        .branch(dptree::case![State::Start].endpoint(show_menu))
        .branch(dptree::case![State::Dashboard { epoch }].endpoint(choose_panel))
        .branch(dptree::case![State::Chat(panel)].endpoint(chat))
        .branch(dptree::case![State::Summarize(panel)].endpoint(summarize))
        .branch(dptree::case![State::Quiz(panel)].endpoint(quiz_panel));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![storage, gateway, locks])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Runs `f` against the freshest state of this chat and stores the result.
async fn with_state<R>(
    dialogue: &StudyDialogue,
    locks: &ChatLocks,
    f: impl FnOnce(&mut State) -> R,
) -> Result<R, HandlerError> {
    let lock = locks.get(dialogue.chat_id());
    let _guard = lock.lock().await;

    let mut state = dialogue.get_or_default().await?;
    let result = f(&mut state);
    dialogue.update(state).await?;
    Ok(result)
}

async fn send_screen(bot: &Bot, chat_id: ChatId, screen: Screen) -> HandlerResult {
    let (chunks, html) = screen.chunks();
    let last = chunks.len().saturating_sub(1);

    for (i, chunk) in chunks.into_iter().enumerate() {
        let mut request = bot.send_message(chat_id, chunk);
        if html {
            request = request.parse_mode(ParseMode::Html);
        }
        if i == last {
            if let Some(keyboard) = screen.keyboard.clone() {
                request = request.reply_markup(keyboard);
            }
        }
        request.await?;
    }
    Ok(())
}

fn rejection_text(err: PanelError) -> String {
    match err {
        PanelError::Busy => {
            "Still working on your last request, hang on a moment. Send /restart if it seems stuck.".to_string()
        }
        other => format!("Sorry, {}.", other),
    }
}

/// Runs a model request off the update loop and applies its reply once it
/// arrives. `resolve` returns the screen to show, or `None` if the reply was
/// stale.
fn spawn_request<E, Fut, F>(bot: Bot, dialogue: StudyDialogue, locks: Arc<ChatLocks>, request: Fut, resolve: F)
where
    E: Send + 'static,
    Fut: Future<Output = E> + Send + 'static,
    F: FnOnce(&mut State, E) -> Option<Screen> + Send + 'static,
{
    tokio::spawn(async move {
        let chat_id = dialogue.chat_id();
        // Typing status is cosmetic; failures are ignored.
        let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

        let event = request.await;
        let screen = match with_state(&dialogue, &locks, |state| resolve(state, event)).await {
            Ok(screen) => screen,
            Err(e) => {
                error!("Failed to store reply for chat {}: {}", chat_id, e);
                let notice = "Sorry, something went wrong while saving the answer. Send /restart to continue.";
                if let Err(e) = bot.send_message(chat_id, notice).await {
                    error!("Failed to notify chat {}: {}", chat_id, e);
                }
                return;
            }
        };

        match screen {
            Some(screen) => {
                if let Err(e) = send_screen(&bot, chat_id, screen).await {
                    error!("Failed to deliver reply to chat {}: {}", chat_id, e);
                }
            }
            None => debug!("Dropped stale reply for chat {}", chat_id),
        }
    });
}

async fn command(
    bot: Bot,
    dialogue: StudyDialogue,
    gateway: Arc<dyn ModelGateway>,
    locks: Arc<ChatLocks>,
    msg: Message,
    cmd: Command,
) -> HandlerResult {
    let screen = match cmd {
        Command::Help => Screen::plain(Command::descriptions().to_string()),
        Command::Start | Command::Menu => {
            with_state(&dialogue, &locks, |state| {
                *state = state.dashboard();
                state.screen()
            })
            .await?
        }
        Command::Restart => {
            with_state(&dialogue, &locks, |state| {
                *state = state.restart(gateway.as_ref());
                state.screen()
            })
            .await?
        }
        Command::Questions(arg) => {
            let Ok(count) = arg.trim().parse::<i64>() else {
                bot.send_message(msg.chat.id, "Usage: /questions N, where N is between 1 and 10")
                    .await?;
                return Ok(());
            };
            with_state(&dialogue, &locks, |state| match state {
                State::Quiz(panel) => match panel.apply(QuizEvent::SetQuestionCount(count)) {
                    Ok(_) => state.screen(),
                    Err(e) => Screen::plain(rejection_text(e)),
                },
                _ => Screen::plain("Open the Quiz Generator first."),
            })
            .await?
        }
    };

    send_screen(&bot, msg.chat.id, screen).await
}

async fn show_menu(bot: Bot, dialogue: StudyDialogue, locks: Arc<ChatLocks>, msg: Message) -> HandlerResult {
    let screen = with_state(&dialogue, &locks, |state| {
        *state = state.dashboard();
        state.screen()
    })
    .await?;
    send_screen(&bot, msg.chat.id, screen).await
}

async fn choose_panel(
    bot: Bot,
    dialogue: StudyDialogue,
    gateway: Arc<dyn ModelGateway>,
    locks: Arc<ChatLocks>,
    msg: Message,
) -> HandlerResult {
    let Some(kind) = msg.text().and_then(PanelKind::from_label) else {
        let screen = Screen::plain("Please pick one of the options.").with_keyboard(render::dashboard_keyboard());
        return send_screen(&bot, msg.chat.id, screen).await;
    };

    info!("Chat {} opened {}", msg.chat.id, kind.label());
    let screen = with_state(&dialogue, &locks, |state| {
        *state = state.open(kind, gateway.as_ref());
        state.screen()
    })
    .await?;
    send_screen(&bot, msg.chat.id, screen).await
}

/// Leaves the current panel when the menu key was pressed.
async fn back_to_menu(bot: &Bot, dialogue: &StudyDialogue, locks: &ChatLocks, msg: &Message) -> Result<bool, HandlerError> {
    if msg.text().map(str::trim) != Some(render::MENU_BUTTON) {
        return Ok(false);
    }
    let screen = with_state(dialogue, locks, |state| {
        *state = state.dashboard();
        state.screen()
    })
    .await?;
    send_screen(bot, msg.chat.id, screen).await?;
    Ok(true)
}

async fn chat(
    bot: Bot,
    dialogue: StudyDialogue,
    gateway: Arc<dyn ModelGateway>,
    locks: Arc<ChatLocks>,
    msg: Message,
) -> HandlerResult {
    if back_to_menu(&bot, &dialogue, &locks, &msg).await? {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Please send your question as text.").await?;
        return Ok(());
    };

    let outcome = with_state(&dialogue, &locks, |state| match state {
        State::Chat(panel) => Some(panel.apply(ChatEvent::Submit(text.to_string()))),
        _ => None,
    })
    .await?;

    match outcome {
        Some(Ok(ChatOutcome::Request(request))) => {
            spawn_request(bot, dialogue, locks, run_turn(gateway, request), |state, event| {
                let State::Chat(panel) = state else {
                    return None;
                };
                match panel.apply(event) {
                    Ok(ChatOutcome::Answered) => panel
                        .last_message()
                        .map(|m| Screen::plain(m.content.clone()).with_keyboard(render::chat_keyboard())),
                    _ => None,
                }
            });
        }
        Some(Err(e)) => {
            bot.send_message(msg.chat.id, rejection_text(e)).await?;
        }
        Some(Ok(_)) | None => {}
    }
    Ok(())
}

async fn run_turn(gateway: Arc<dyn ModelGateway>, request: TurnRequest) -> ChatEvent {
    request.run(gateway.as_ref()).await
}

async fn run_summary(gateway: Arc<dyn ModelGateway>, request: SummaryRequest) -> SummarizeEvent {
    request.run(gateway.as_ref()).await
}

async fn run_quiz(gateway: Arc<dyn ModelGateway>, request: QuizRequest) -> QuizEvent {
    request.run(gateway.as_ref()).await
}

async fn summarize(
    bot: Bot,
    dialogue: StudyDialogue,
    gateway: Arc<dyn ModelGateway>,
    locks: Arc<ChatLocks>,
    msg: Message,
) -> HandlerResult {
    if back_to_menu(&bot, &dialogue, &locks, &msg).await? {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Please paste your notes as text.").await?;
        return Ok(());
    };

    let event = match Difficulty::from_label(text) {
        Some(difficulty) => SummarizeEvent::SetDifficulty(difficulty),
        None => SummarizeEvent::Submit(text.to_string()),
    };
    let outcome = with_state(&dialogue, &locks, |state| match state {
        State::Summarize(panel) => Some(panel.apply(event).map(|o| (o, panel.difficulty()))),
        _ => None,
    })
    .await?;

    match outcome {
        Some(Ok((SummarizeOutcome::Request(request), _))) => {
            spawn_request(bot, dialogue, locks, run_summary(gateway, request), |state, event| {
                let State::Summarize(panel) = state else {
                    return None;
                };
                match panel.apply(event) {
                    Ok(SummarizeOutcome::Finished) => Some(render::summarize_result(panel)),
                    _ => None,
                }
            });
        }
        Some(Ok((SummarizeOutcome::DifficultyChanged, difficulty))) => {
            bot.send_message(msg.chat.id, format!("Level set to {}.", difficulty.label()))
                .await?;
        }
        Some(Err(e)) => {
            bot.send_message(msg.chat.id, rejection_text(e)).await?;
        }
        Some(Ok(_)) | None => {}
    }
    Ok(())
}

async fn quiz_panel(
    bot: Bot,
    dialogue: StudyDialogue,
    gateway: Arc<dyn ModelGateway>,
    locks: Arc<ChatLocks>,
    msg: Message,
) -> HandlerResult {
    if back_to_menu(&bot, &dialogue, &locks, &msg).await? {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Please send text.").await?;
        return Ok(());
    };

    let result = with_state(&dialogue, &locks, |state| {
        let State::Quiz(panel) = state else {
            return None;
        };
        let event = quiz_event(panel, text);
        Some(panel.apply(event).map(|outcome| (outcome, render::quiz(panel))))
    })
    .await?;

    match result {
        Some(Ok((QuizOutcome::Request(request), screen))) => {
            // The panel is already Loading; the request must go out even if this notice does not.
            if let Err(e) = send_screen(&bot, msg.chat.id, screen).await {
                warn!("Failed to show loading screen in chat {}: {}", msg.chat.id, e);
            }
            spawn_request(bot, dialogue, locks, run_quiz(gateway, request), |state, event| {
                let State::Quiz(panel) = state else {
                    return None;
                };
                match panel.apply(event) {
                    Ok(QuizOutcome::Started) | Ok(QuizOutcome::Failed) => Some(render::quiz(panel)),
                    _ => None,
                }
            });
        }
        Some(Ok((QuizOutcome::Unchanged, _))) => {
            bot.send_message(msg.chat.id, "Paste some notes first.").await?;
        }
        Some(Ok((_, screen))) => send_screen(&bot, msg.chat.id, screen).await?,
        Some(Err(e)) => {
            bot.send_message(msg.chat.id, rejection_text(e)).await?;
        }
        None => {}
    }
    Ok(())
}
