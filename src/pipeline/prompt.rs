use crate::constants::{ALL_LOCATIONS, GENERAL_MOVIE, UNKNOWN_GOODS};
use crate::locations::LOTTE_LOCATIONS;

/// Build the structured-extraction prompt sent with every screenshot.
///
/// The page text is Korean, so the instructions are too. The model must answer
/// with a single JSON object and nothing else.
pub fn extraction_prompt() -> String {
    let branch_list = LOTTE_LOCATIONS.join(", ");

    format!(
        r#"
당신은 영화관 이벤트 페이지에서 정보를 추출하는 전문가입니다.
제공된 롯데시네마 이벤트 상세 페이지 이미지를 분석해주세요.

이미지에서 다음 정보를 정확히 추출해야 합니다:

1. "movieTitle" (영화 제목):
   - 특정 영화와 관련된 이벤트인 경우, 이미지에 표시된 정확한 영화 제목을 추출하세요.
   - 영화와 관련 없는 일반 이벤트인 경우 "{general}"을 사용하세요.

2. "goodsType" (상품 종류):
   - 제공되는 상품의 종류를 추출하세요. (예: "시그니처 아트카드", "포스터", "배지", "포토카드", "키링")
   - 여러 종류가 있으면 쉼표로 구분하여 결합하세요. (예: "시그니처 아트카드, 포스터")
   - 이미지에서 확인할 수 없는 경우 "{unknown}"을 사용하세요.

3. "locations" (지점 정보):
   - "전국", "전 지점", "모든 지점" 등의 표현이 있으면 ["{all}"]을 반환하세요.
   - 특정 지점이 나열되어 있으면 모든 지점을 배열로 추출하세요. (예: ["월드타워", "건대입구"])
   - 지점 정보가 없는 경우 빈 배열 []을 반환하세요.

[지점 리스트]
아래 리스트에 있는 지점명만 사용하세요. 없는 지점이나 오타를 만들지 마세요.
{branches}

[분석 단계]
1. 이미지 내 텍스트를 모두 읽으세요.
2. '진행 지점'과 '제외 지점(미진행 지점)'을 구분하세요. 작게 적힌 제외 지점 목록에 주의하세요.
3. 제외 지점에 포함된 곳은 절대 결과에 넣지 마세요.
4. 추출한 지점명을 위 [지점 리스트]의 정확한 명칭으로 바꾸세요.

반드시 아래 JSON 형식으로만 응답하세요. 다른 설명이나 텍스트는 포함하지 마세요.
{{
  "movieTitle": "영화 제목 또는 {general}",
  "goodsType": "상품 종류",
  "locations": ["지점1", "지점2"]
}}
"#,
        general = GENERAL_MOVIE,
        unknown = UNKNOWN_GOODS,
        all = ALL_LOCATIONS,
        branches = branch_list,
    )
}
