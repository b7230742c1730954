/// Canonical Lotte Cinema branch names.
///
/// The vision prompt tells the model to snap every extracted location to one of these,
/// so spellings here are what ends up in the `locations` column.
pub const LOTTE_LOCATIONS: &[&str] = &[
    // Seoul
    "가산디지털", "가양", "강동", "건대입구", "김포공항", "노원", "도곡", "독산",
    "브로드웨이(신사)", "서울대입구", "수락산", "수유", "신도림", "신림",
    "에비뉴엘(명동)", "영등포", "용산", "월드타워", "은평(롯데몰)", "중랑",
    "청량리", "합정", "홍대입구", "황학",
    // Gyeonggi / Incheon
    "광교아울렛", "광명아울렛", "구리아울렛", "동탄", "라페스타", "마석", "병점",
    "부천(신중동역)", "부천역", "부평", "부평갈산", "부평역사", "산본피트인",
    "센트럴락", "송탄", "수원(수원역)", "시화", "안산", "안성", "안양일번가",
    "오산(원동)", "용인기흥", "용인역북", "위례", "의정부민락", "인덕원",
    "인천아시아드", "인천터미널", "주엽", "진접", "파주운정", "판교(창조경제밸리)",
    "평촌(범계역)", "평택비전(뉴코아)", "하남미사", "향남", "화정",
    // Busan / Ulsan / Gyeongnam
    "광복", "동래", "부산명지", "부산본점", "사상", "서면(전포동)", "센텀시티",
    "오투(부산대)", "울산", "울산성남", "김해부원", "김해아울렛", "마산(합성동)",
    "진주혁신", "창원", "거창",
    // Daegu / Gyeongbuk
    "대구광장", "대구율하", "대구현대", "동성로", "상인", "성서", "프리미엄만경",
    "경주", "구미공단", "포항",
    // Gwangju / Jeolla
    "광주(백화점)", "광주광산", "수완아울렛", "충장로", "군산몰", "익산모현",
    "전주(백화점)", "전주평화",
    // Daejeon / Chungcheong
    "대전(백화점)", "대전관저", "대전센트럴", "서산", "아산터미널", "천안",
    "천안불당", "청주(서문)", "청주용암", "충주",
    // Gangwon / Jeju
    "원주무실", "춘천", "제주삼화지구", "서귀포",
];
