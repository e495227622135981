//! Fixed country catalog shared by scoring, prompts and the HTTP surface.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Continent {
    Asia,
    Europe,
    NorthAmerica,
    SouthAmerica,
    Oceania,
    MiddleEast,
    Africa,
}

impl Continent {
    pub const ALL: [Continent; 7] = [
        Continent::Asia,
        Continent::Europe,
        Continent::NorthAmerica,
        Continent::SouthAmerica,
        Continent::Oceania,
        Continent::MiddleEast,
        Continent::Africa,
    ];

    /// Korean display label used in product copy.
    pub fn label(self) -> &'static str {
        match self {
            Continent::Asia => "아시아",
            Continent::Europe => "유럽",
            Continent::NorthAmerica => "북미",
            Continent::SouthAmerica => "남미",
            Continent::Oceania => "오세아니아",
            Continent::MiddleEast => "중동",
            Continent::Africa => "아프리카",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryRecord {
    pub code: &'static str,
    pub display_name: &'static str,
    pub english_name: &'static str,
    #[serde(rename = "flag")]
    pub flag_glyph: &'static str,
    pub continent: Continent,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
}

impl CountryRecord {
    /// Currency whose KRW rate prices this country. Anything outside the priced set,
    /// euro-area members included, is priced in US dollars.
    pub fn rate_currency(&self) -> &'static str {
        match self.code {
            "US" => "USD",
            "GB" => "GBP",
            "JP" => "JPY",
            "CN" => "CNY",
            "KR" => "KRW",
            "AU" => "AUD",
            "CA" => "CAD",
            "TH" => "THB",
            "VN" => "VND",
            "SG" => "SGD",
            "MY" => "MYR",
            "ID" => "IDR",
            "PH" => "PHP",
            "TW" => "TWD",
            "HK" => "HKD",
            _ => "USD",
        }
    }
}

const fn country(
    code: &'static str,
    display_name: &'static str,
    english_name: &'static str,
    flag_glyph: &'static str,
    continent: Continent,
    latitude: f64,
    longitude: f64,
) -> CountryRecord {
    CountryRecord {
        code,
        display_name,
        english_name,
        flag_glyph,
        continent,
        latitude,
        longitude,
    }
}

use self::Continent::*;

static COUNTRIES: [CountryRecord; 39] = [
    country("KR", "대한민국", "South Korea", "🇰🇷", Asia, 37.5665, 126.9780),
    country("JP", "일본", "Japan", "🇯🇵", Asia, 35.6762, 139.6503),
    country("CN", "중국", "China", "🇨🇳", Asia, 39.9042, 116.4074),
    country("TH", "태국", "Thailand", "🇹🇭", Asia, 13.7563, 100.5018),
    country("VN", "베트남", "Vietnam", "🇻🇳", Asia, 21.0285, 105.8542),
    country("SG", "싱가포르", "Singapore", "🇸🇬", Asia, 1.3521, 103.8198),
    country("MY", "말레이시아", "Malaysia", "🇲🇾", Asia, 3.1390, 101.6869),
    country("ID", "인도네시아", "Indonesia", "🇮🇩", Asia, -6.2088, 106.8456),
    country("PH", "필리핀", "Philippines", "🇵🇭", Asia, 14.5995, 120.9842),
    country("IN", "인도", "India", "🇮🇳", Asia, 28.6139, 77.2090),
    country("TW", "대만", "Taiwan", "🇹🇼", Asia, 25.0330, 121.5654),
    country("HK", "홍콩", "Hong Kong", "🇭🇰", Asia, 22.3193, 114.1694),
    country("GB", "영국", "United Kingdom", "🇬🇧", Europe, 51.5074, -0.1278),
    country("FR", "프랑스", "France", "🇫🇷", Europe, 48.8566, 2.3522),
    country("DE", "독일", "Germany", "🇩🇪", Europe, 52.5200, 13.4050),
    country("IT", "이탈리아", "Italy", "🇮🇹", Europe, 41.9028, 12.4964),
    country("ES", "스페인", "Spain", "🇪🇸", Europe, 40.4168, -3.7038),
    country("NL", "네덜란드", "Netherlands", "🇳🇱", Europe, 52.3676, 4.9041),
    country("CH", "스위스", "Switzerland", "🇨🇭", Europe, 46.9479, 7.4474),
    country("AT", "오스트리아", "Austria", "🇦🇹", Europe, 48.2082, 16.3738),
    country("GR", "그리스", "Greece", "🇬🇷", Europe, 37.9838, 23.7275),
    country("PT", "포르투갈", "Portugal", "🇵🇹", Europe, 38.7223, -9.1393),
    country("CZ", "체코", "Czechia", "🇨🇿", Europe, 50.0755, 14.4378),
    country("RU", "러시아", "Russia", "🇷🇺", Europe, 55.7558, 37.6173),
    country("US", "미국", "United States", "🇺🇸", NorthAmerica, 40.7128, -74.0060),
    country("CA", "캐나다", "Canada", "🇨🇦", NorthAmerica, 43.6532, -79.3832),
    country("MX", "멕시코", "Mexico", "🇲🇽", NorthAmerica, 19.4326, -99.1332),
    country("BR", "브라질", "Brazil", "🇧🇷", SouthAmerica, -23.5505, -46.6333),
    country("AR", "아르헨티나", "Argentina", "🇦🇷", SouthAmerica, -34.6037, -58.3816),
    country("CL", "칠레", "Chile", "🇨🇱", SouthAmerica, -33.4489, -70.6693),
    country("PE", "페루", "Peru", "🇵🇪", SouthAmerica, -12.0464, -77.0428),
    country("AU", "호주", "Australia", "🇦🇺", Oceania, -33.8688, 151.2093),
    country("NZ", "뉴질랜드", "New Zealand", "🇳🇿", Oceania, -36.8485, 174.7633),
    country("AE", "아랍에미리트", "United Arab Emirates", "🇦🇪", MiddleEast, 25.2048, 55.2708),
    country("TR", "터키", "Türkiye", "🇹🇷", MiddleEast, 41.0082, 28.9784),
    country("IL", "이스라엘", "Israel", "🇮🇱", MiddleEast, 32.0853, 34.7818),
    country("EG", "이집트", "Egypt", "🇪🇬", Africa, 30.0444, 31.2357),
    country("ZA", "남아프리카공화국", "South Africa", "🇿🇦", Africa, -33.9249, 18.4241),
    country("MA", "모로코", "Morocco", "🇲🇦", Africa, 33.9716, -6.8498),
];

pub fn all_countries() -> &'static [CountryRecord] {
    &COUNTRIES
}

pub fn find_country(code: &str) -> Option<&'static CountryRecord> {
    COUNTRIES.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

pub fn countries_in(continent: Continent) -> impl Iterator<Item = &'static CountryRecord> {
    COUNTRIES.iter().filter(move |c| c.continent == continent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_are_unique() {
        let codes: HashSet<_> = all_countries().iter().map(|c| c.code).collect();
        assert_eq!(codes.len(), all_countries().len());
    }

    #[test]
    fn every_continent_is_populated_and_grouping_is_exhaustive() {
        let mut grouped = 0;
        for continent in Continent::ALL {
            let n = countries_in(continent).count();
            assert!(n > 0, "{continent:?} has no countries");
            grouped += n;
        }
        assert_eq!(grouped, all_countries().len());
        assert!(all_countries().len() >= 35);
    }

    #[test]
    fn find_country_is_case_insensitive() {
        assert_eq!(find_country("jp").map(|c| c.english_name), Some("Japan"));
        assert!(find_country("XX").is_none());
    }

    #[test]
    fn serializes_with_client_field_names() {
        let v = serde_json::to_value(find_country("VN").unwrap()).unwrap();
        assert_eq!(v["code"], "VN");
        assert_eq!(v["displayName"], "베트남");
        assert_eq!(v["continent"], "asia");
        assert_eq!(v["flag"], "🇻🇳");
        assert!(v["lat"].as_f64().is_some());
    }

    #[test]
    fn unpriced_countries_fall_back_to_dollars() {
        let currency = |code| find_country(code).unwrap().rate_currency();
        assert_eq!(currency("JP"), "JPY");
        assert_eq!(currency("VN"), "VND");
        assert_eq!(currency("MX"), "USD");
        assert_eq!(currency("IN"), "USD");
        assert_eq!(currency("FR"), "USD");
        assert!(all_countries()
            .iter()
            .all(|c| c.rate_currency().len() == 3));
    }
}
