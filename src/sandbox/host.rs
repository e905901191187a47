//! JavaScript evaluated inside every sandbox context.
//!
//! `REACT_PRIMITIVE` is the only capability a widget can `require`. Hooks
//! follow render-once semantics: state setters are inert and effects never
//! run, because a widget is rendered to static HTML exactly once per pass.
//!
//! `RENDER_GLUE` expands an element tree into a JSON array of text strings
//! and `{tag, attrs, children}` objects that the host turns into HTML.

pub(super) const REACT_PRIMITIVE: &str = r#"(function () {
  const ELEMENT = Symbol.for("widget.element");
  const FRAGMENT = Symbol.for("widget.fragment");
  const inert = function () {};

  function flatten(list, out) {
    for (const item of list) {
      if (Array.isArray(item)) flatten(item, out);
      else out.push(item);
    }
    return out;
  }

  function createElement(type, config, ...children) {
    const props = {};
    let key = null;
    if (config != null) {
      for (const name of Object.keys(config)) {
        if (name === "key") {
          key = config.key == null ? null : String(config.key);
        } else if (name !== "ref") {
          props[name] = config[name];
        }
      }
    }
    if (children.length === 1) props.children = children[0];
    else if (children.length > 1) props.children = children;
    if (type != null && type.defaultProps) {
      for (const name of Object.keys(type.defaultProps)) {
        if (props[name] === undefined) props[name] = type.defaultProps[name];
      }
    }
    return Object.freeze({ $$typeof: ELEMENT, type: type, key: key, props: props });
  }

  function isValidElement(value) {
    return value != null && typeof value === "object" && value.$$typeof === ELEMENT;
  }

  class Component {
    constructor(props) {
      this.props = props;
      this.state = {};
    }
    setState() {}
    forceUpdate() {}
  }
  Component.prototype.isReactComponent = {};
  class PureComponent extends Component {}

  function createContext(defaultValue) {
    const context = { _currentValue: defaultValue };
    context.Provider = { $$provider: context };
    context.Consumer = { $$consumer: context };
    return context;
  }

  const Children = {
    toArray(children) {
      if (children == null) return [];
      return flatten([children], []).filter((c) => c != null && typeof c !== "boolean");
    },
    map(children, fn) { return Children.toArray(children).map(fn); },
    forEach(children, fn) { Children.toArray(children).forEach(fn); },
    count(children) { return Children.toArray(children).length; },
    only(children) { return children; },
  };

  let nextId = 0;
  const React = {
    createElement: createElement,
    isValidElement: isValidElement,
    Fragment: FRAGMENT,
    StrictMode: FRAGMENT,
    Component: Component,
    PureComponent: PureComponent,
    Children: Children,
    createContext: createContext,
    useState(initial) {
      return [typeof initial === "function" ? initial() : initial, inert];
    },
    useReducer(reducer, initialArg, init) {
      return [typeof init === "function" ? init(initialArg) : initialArg, inert];
    },
    useEffect: inert,
    useLayoutEffect: inert,
    useInsertionEffect: inert,
    useRef(initial) { return { current: initial }; },
    useMemo(factory) { return factory(); },
    useCallback(fn) { return fn; },
    useContext(context) { return context == null ? undefined : context._currentValue; },
    useId() { nextId += 1; return ":w" + nextId + ":"; },
    memo(component) { return component; },
    forwardRef(render) { return function (props) { return render(props, null); }; },
    version: "18.0.0-widget",
  };
  React.default = React;
  return Object.freeze(React);
})()"#;

pub(super) const RENDER_GLUE: &str = r#"(function (React, maxDepth) {
  const ELEMENT = Symbol.for("widget.element");
  const FRAGMENT = Symbol.for("widget.fragment");
  const ALIASES = { className: "class", htmlFor: "for" };
  const SKIPPED = { children: 1, key: 1, ref: 1, dangerouslySetInnerHTML: 1 };
  const UNITLESS = {
    animationIterationCount: 1, flex: 1, flexGrow: 1, flexShrink: 1, fontWeight: 1,
    gridColumn: 1, gridRow: 1, lineHeight: 1, opacity: 1, order: 1, orphans: 1,
    widows: 1, zIndex: 1, zoom: 1,
  };

  function cssName(name) {
    if (name.startsWith("--")) return name;
    return name.replace(/[A-Z]/g, (m) => "-" + m.toLowerCase()).replace(/^ms-/, "-ms-");
  }

  function cssText(style) {
    if (style == null || typeof style !== "object") return String(style);
    const parts = [];
    for (const name of Object.keys(style)) {
      const value = style[name];
      if (value == null || typeof value === "boolean" || value === "") continue;
      const text = typeof value === "number" && value !== 0 && !UNITLESS[name]
        ? value + "px"
        : String(value);
      parts.push(cssName(name) + ": " + text);
    }
    return parts.join("; ");
  }

  function attributes(props) {
    const out = [];
    for (const name of Object.keys(props)) {
      if (SKIPPED[name]) continue;
      const value = props[name];
      if (value == null || value === false) continue;
      if (typeof value === "function" || typeof value === "symbol") continue;
      const attr = ALIASES[name] || name;
      if (name === "style") {
        const css = cssText(value);
        if (css) out.push([attr, css]);
      } else {
        out.push([attr, value === true ? "" : String(value)]);
      }
    }
    return out;
  }

  // `depth` counts host elements only; components, fragments and arrays do
  // not nest the output.
  function expand(node, depth, out) {
    if (node == null || typeof node === "boolean") return out;
    if (typeof node === "string") { out.push(node); return out; }
    if (typeof node === "number" || typeof node === "bigint") { out.push(String(node)); return out; }
    if (Array.isArray(node)) {
      for (const child of node) expand(child, depth, out);
      return out;
    }
    if (typeof node === "object" && node.$$typeof === ELEMENT) {
      const type = node.type;
      const props = node.props || {};
      if (type === FRAGMENT) return expand(props.children, depth, out);
      if (typeof type === "string") {
        if (depth >= maxDepth) {
          throw new RangeError("widget render tree exceeds " + maxDepth + " nested elements");
        }
        out.push({ tag: type, attrs: attributes(props), children: expand(props.children, depth + 1, []) });
        return out;
      }
      if (typeof type === "function") {
        if (type.prototype && type.prototype.isReactComponent) {
          const instance = new type(props);
          instance.props = props;
          return expand(instance.render(), depth, out);
        }
        return expand(type(props), depth, out);
      }
      if (type != null && type.$$provider) {
        const context = type.$$provider;
        const previous = context._currentValue;
        context._currentValue = props.value;
        try {
          return expand(props.children, depth, out);
        } finally {
          context._currentValue = previous;
        }
      }
      if (type != null && type.$$consumer) {
        const fn = props.children;
        if (typeof fn !== "function") return out;
        return expand(fn(type.$$consumer._currentValue), depth, out);
      }
      throw new TypeError(
        "Element type is invalid: expected a string or a component but got: " +
          (type === null ? "null" : typeof type)
      );
    }
    if (typeof node === "object") {
      throw new TypeError(
        "Objects are not valid as a widget child (found: object with keys {" +
          Object.keys(node).join(", ") + "})"
      );
    }
    return out;
  }

  return function (component, propsJson) {
    const props = JSON.parse(propsJson);
    return JSON.stringify(expand(React.createElement(component, props), 0, []));
  };
})"#;
