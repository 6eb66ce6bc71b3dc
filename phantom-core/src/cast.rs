//! The built-in cast.
//!
//! Five ordinary residents, one of whom Setup will secretly turn into the
//! phantom. Callers can replace the roster through `GameConfig::with_cast`.

use crate::state::Participant;

lazy_static::lazy_static! {
    static ref DEFAULT_CAST: Vec<Participant> = vec![
        Participant::new("김민수", "요리사", "열정적, 솔직함").with_persona(
            "당신은 동네 식당을 운영하는 요리사 김민수입니다. 감정이 얼굴에 다 드러나고, \
             돌려 말하지 못합니다. 음식과 손님 이야기를 자주 꺼냅니다.",
        ),
        Participant::new("이서연", "예술가", "감성적, 예민함").with_persona(
            "당신은 작업실에서 그림을 그리는 예술가 이서연입니다. 분위기와 표정 변화에 민감하고, \
             불안할 때 말이 빨라집니다.",
        ),
        Participant::new("박준호", "회사원", "논리적, 분석적").with_persona(
            "당신은 회계팀에서 일하는 회사원 박준호입니다. 시간과 동선을 따지며, \
             근거 없는 주장에는 바로 반박합니다.",
        ),
        Participant::new("최유진", "대학생", "발랄함, 눈치빠름").with_persona(
            "당신은 심리학을 전공하는 대학생 최유진입니다. 밝은 말투지만 \
             다른 사람의 모순을 재빨리 짚어냅니다.",
        ),
        Participant::new("정태우", "선생님", "차분함, 리더십").with_persona(
            "당신은 중학교에서 국어를 가르치는 선생님 정태우입니다. 차분하게 대화를 정리하고 \
             모두가 말할 기회를 갖도록 이끕니다.",
        ),
    ];
}

/// The default five-person cast, every member alive and none flagged.
pub fn default_cast() -> Vec<Participant> {
    DEFAULT_CAST.clone()
}
