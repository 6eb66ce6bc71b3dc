//! Prompt and notice text.
//!
//! Personas and task strings handed to the dialogue generator, plus the
//! fixed system notices the engine writes into the message log.

use super::generator::{ContextLine, TaskKind};
use crate::state::{GameResult, GameState, Participant};

/// Secret block appended to the phantom's persona.
const PHANTOM_INSTRUCTIONS: &str = "\
## 비밀 지령
당신은 사실 팬텀입니다. 밤마다 마을 사람을 한 명씩 습격했습니다.
- 절대로 자신이 팬텀이라는 사실을 밝히지 마세요.
- 밤 시간의 행적을 물으면 그럴듯한 알리바이를 지어내세요.
- 의심을 받으면 침착하게 반박하고, 자연스럽게 다른 사람에게 의심을 돌리세요.
- 평소 성격과 말투를 유지해서 티가 나지 않게 하세요.";

const GAME_RULES: &str = "\
## 상황
마을에서 연쇄 습격 사건이 일어나고 있습니다. 참가자 중 한 명이 정체를 숨긴 팬텀입니다.
모두 한자리에 모여 범인을 찾기 위해 대화를 나누고 있습니다.
- 한두 문장으로 짧게, 실제 대화처럼 말하세요.
- 이름표나 따옴표 없이 대사만 출력하세요.";

/// Opening system message emitted by Setup.
pub fn opening_message(participant_count: usize) -> String {
    format!(
        "{participant_count}명의 참가자가 모였습니다. 이 중 한 명은 정체를 숨긴 팬텀입니다. \
         대화를 나누고, 의심 가는 사람을 지목하고, 투표로 팬텀을 찾아내세요."
    )
}

/// The system persona a participant speaks with.
///
/// Includes the secret block for the phantom, the participant's current
/// standing and the summaries of earlier rounds.
pub fn persona_for(participant: &Participant, state: &GameState) -> String {
    let mut persona = if participant.persona.trim().is_empty() {
        format!(
            "당신은 {}입니다. 직업은 {}이고, 성격은 {}입니다.",
            participant.name, participant.job, participant.personality
        )
    } else {
        participant.persona.clone()
    };

    persona.push_str("\n\n");
    persona.push_str(GAME_RULES);

    if participant.is_phantom {
        persona.push_str("\n\n");
        persona.push_str(PHANTOM_INSTRUCTIONS);
    }

    persona.push_str(&format!("\n\n## 현재 {}라운드\n", state.round_number));
    persona.push_str(&format!("살아 있는 사람: {}\n", state.alive_names().join(", ")));
    let suspicion = state.suspicion.get(&participant.name).copied().unwrap_or(0);
    if suspicion > 0 {
        persona.push_str(&format!("당신은 지금까지 {suspicion}번 의심을 받았습니다.\n"));
    }

    if !state.round_summaries.is_empty() {
        persona.push_str("\n## 지난 라운드\n");
        for (round, summary) in &state.round_summaries {
            persona.push_str(&format!("- {round}라운드: {summary}\n"));
        }
    }

    persona
}

/// Neutral persona used for analysis tasks that no character speaks.
pub fn narrator_persona() -> &'static str {
    "당신은 추리 게임의 진행자입니다. 요청받은 형식 그대로, 군더더기 없이 답하세요."
}

pub fn utterance_task(speaker: &str) -> String {
    format!(
        "{}\n{speaker}로서 지금까지의 대화에 이어 한마디 하세요. \
         질문을 받았다면 답하고, 의심을 받았다면 해명하세요.",
        TaskKind::Utterance.header()
    )
}

pub fn reply_task(speaker: &str) -> String {
    format!(
        "{}\n유저가 {speaker}에게 따로 말을 걸었습니다. {speaker}로서 유저의 마지막 말에 대답하세요.",
        TaskKind::Reply.header()
    )
}

/// Ask the generator who should speak next.
pub fn rank_task(candidates: &[&str]) -> String {
    format!(
        "{}\n후보: {}\n\
         다음 기준으로 가장 자연스럽게 이어서 말할 사람 한 명을 고르세요.\n\
         1. 직접 질문을 받은 사람\n\
         2. 의심이나 비난을 받아 해명이 필요한 사람\n\
         3. 그 외에는 대화에 자연스럽게 끼어들 만한 사람\n\
         같은 사람이 연달아 말하지 않게 하세요. 후보 이름 하나만 답하세요.",
        TaskKind::RankSpeaker.header(),
        candidates.join(", ")
    )
}

/// Ask for a clue left by the phantom at the scene.
pub fn clue_task(phantom: &Participant, victim: &str) -> String {
    format!(
        "{}\n간밤에 {victim}이(가) 습격당했습니다. 범인은 {}({}, {})입니다.\n\
         현장에 남은 단서를 한 문장으로 묘사하세요. 범인의 이름이나 직업을 직접 말해서는 안 되고, \
         직업이나 성격을 넌지시 암시하는 물건이나 흔적이어야 합니다.",
        TaskKind::Clue.header(),
        phantom.name,
        phantom.job,
        phantom.personality
    )
}

/// Ask for accusations among the living, as JSON.
pub fn accusations_task(alive: &[&str]) -> String {
    format!(
        "{}\n살아 있는 참가자: {}\n\
         대화를 읽고 누가 누구를 의심했는지 정리하세요. 다음 JSON 형식으로만 답하세요.\n\
         {{\"accusations\": [{{\"accuser\": \"이름\", \"target\": \"이름\"}}]}}\n\
         의심이 없었다면 빈 배열을 돌려주세요.",
        TaskKind::Accusations.header(),
        alive.join(", ")
    )
}

pub fn summary_task(round: u32, night_facts: &str, max_chars: usize) -> String {
    format!(
        "{}\n{round}라운드의 대화를 {max_chars}자 이내로 요약하세요. \
         누가 누구를 의심했는지, 중요한 주장과 모순을 빠뜨리지 마세요.\n밤 사건: {night_facts}",
        TaskKind::Summary.header()
    )
}

/// Line used when a participant's utterance cannot be generated.
pub fn fallback_utterance(speaker: &str) -> String {
    format!("({speaker}은(는) 잠시 생각에 잠겨 말이 없다.)")
}

pub fn one_on_one_notice(target: &str) -> String {
    format!("{target}님과 1:1 대화를 시작합니다. (q, exit, quit 입력 시 종료)")
}

pub fn exit_notice() -> &'static str {
    "1:1 대화를 종료하고 토론 모드로 돌아갑니다."
}

pub fn suspect_notice(target: &str, count: u32) -> String {
    format!("유저가 {target}을(를) 의심합니다. (누적 의심 {count}회)")
}

pub fn night_start_message() -> &'static str {
    "밤이 찾아왔습니다. 모두 각자의 집으로 돌아갑니다..."
}

pub fn dawn_message(victim: &str) -> String {
    format!("날이 밝았습니다. 간밤에 {victim}이(가) 습격당해 숨진 채 발견되었습니다.")
}

pub fn quiet_night_message() -> &'static str {
    "날이 밝았습니다. 간밤에는 아무 일도 일어나지 않았습니다."
}

/// Night log entry for a death.
pub fn night_log_entry(round: u32, victim: &str) -> String {
    format!("Round {round} Night: {victim} was attacked and killed.")
}

pub fn quiet_night_log_entry(round: u32) -> String {
    format!("Round {round} Night: no one was attacked.")
}

pub fn summary_banner(round: u32, summary: &str) -> String {
    format!("[{round}라운드 요약] {summary}")
}

pub fn new_day_banner(round: u32, victim: Option<&str>) -> String {
    match victim {
        Some(victim) => format!("[{round}라운드 시작] 새로운 날입니다. {victim}은(는) 더 이상 함께하지 못합니다."),
        None => format!("[{round}라운드 시작] 새로운 날입니다. 모두 무사합니다."),
    }
}

/// Verdict announced when the vote is cast. Names the real phantom.
pub fn verdict_message(accused: &str, phantom: &str, result: GameResult) -> String {
    match result {
        GameResult::Win => format!("투표 결과 {accused}이(가) 지목되었습니다. 정답입니다! {phantom}이(가) 팬텀이었습니다."),
        GameResult::Lose => format!(
            "투표 결과 {accused}이(가) 지목되었습니다. 하지만 {accused}은(는) 팬텀이 아니었습니다. 진짜 팬텀은 {phantom}이었습니다."
        ),
    }
}

/// Render a context window as `speaker: text` lines.
pub fn render_context(context: &[ContextLine]) -> String {
    context
        .iter()
        .map(|line| format!("{}: {}", line.speaker, line.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Clip `text` to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
